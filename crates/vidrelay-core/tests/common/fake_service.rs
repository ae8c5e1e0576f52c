//! Scripted `RemoteUploadService`: holds bytes strictly in order and replays
//! injected faults per chunk offset.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use vidrelay_core::retry::ErrorKind;
use vidrelay_core::upload::{
    ChunkResponse, RemoteUploadService, SessionHandle, UploadError, VideoMetadata,
};

#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// Reject the chunk without storing it.
    Reject(ErrorKind),
    /// Store the chunk, then lose the reply.
    StoreThenFail,
    /// Reply with this ack without storing anything.
    Ack(u64),
}

#[derive(Debug, Default)]
struct State {
    sessions: u32,
    total: u64,
    held: u64,
    sends: Vec<(u64, u64)>,
    queries: u32,
    titles: Vec<String>,
    begin_faults: HashMap<u32, ErrorKind>,
    chunk_faults: HashMap<u64, VecDeque<Fault>>,
}

#[derive(Debug, Default)]
pub struct ScriptedService {
    state: Mutex<State>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `n`-th session initiation (1-based) fail with `kind`.
    pub fn fail_session(&self, n: u32, kind: ErrorKind) {
        self.state.lock().unwrap().begin_faults.insert(n, kind);
    }

    /// Queue a fault for the next chunk sent at `offset`.
    pub fn fault_chunk(&self, offset: u64, fault: Fault) {
        self.state
            .lock()
            .unwrap()
            .chunk_faults
            .entry(offset)
            .or_default()
            .push_back(fault);
    }

    pub fn sessions(&self) -> u32 {
        self.state.lock().unwrap().sessions
    }

    pub fn sends(&self) -> Vec<(u64, u64)> {
        self.state.lock().unwrap().sends.clone()
    }

    pub fn queries(&self) -> u32 {
        self.state.lock().unwrap().queries
    }

    pub fn titles(&self) -> Vec<String> {
        self.state.lock().unwrap().titles.clone()
    }
}

#[async_trait]
impl RemoteUploadService for ScriptedService {
    async fn begin_session(
        &self,
        total_size: u64,
        metadata: &VideoMetadata,
    ) -> Result<SessionHandle, UploadError> {
        let mut st = self.state.lock().unwrap();
        st.sessions += 1;
        let n = st.sessions;
        if let Some(kind) = st.begin_faults.get(&n) {
            return Err(UploadError::new(*kind, format!("session {} rejected", n)));
        }
        st.total = total_size;
        st.held = 0;
        st.titles.push(metadata.title.clone());
        Ok(SessionHandle(format!("session-{}", n)))
    }

    async fn send_chunk(
        &self,
        handle: &SessionHandle,
        offset: u64,
        bytes: Vec<u8>,
        total_size: u64,
    ) -> Result<ChunkResponse, UploadError> {
        let mut st = self.state.lock().unwrap();
        let len = bytes.len() as u64;
        st.sends.push((offset, len));
        assert_eq!(total_size, st.total, "total size changed mid-session");

        let fault = st.chunk_faults.get_mut(&offset).and_then(|q| q.pop_front());
        match fault {
            Some(Fault::Reject(kind)) => {
                return Err(UploadError::new(kind, format!("chunk at {} rejected", offset)))
            }
            Some(Fault::Ack(n)) => return Ok(ChunkResponse::Progress { bytes_acked: n }),
            Some(Fault::StoreThenFail) => {
                st.held = offset + len;
                return Err(UploadError::transient("connection reset"));
            }
            None => {}
        }

        if offset != st.held {
            return Err(UploadError::permanent(format!(
                "chunk at {} but service holds {}",
                offset, st.held
            )));
        }
        st.held += len;
        if st.held == st.total {
            Ok(ChunkResponse::Completed {
                remote_id: format!("vid-{}", handle.as_str()),
            })
        } else {
            Ok(ChunkResponse::Progress { bytes_acked: st.held })
        }
    }

    async fn query_status(
        &self,
        handle: &SessionHandle,
        _total_size: u64,
    ) -> Result<ChunkResponse, UploadError> {
        let mut st = self.state.lock().unwrap();
        st.queries += 1;
        if st.held == st.total {
            return Ok(ChunkResponse::Completed {
                remote_id: format!("vid-{}", handle.as_str()),
            });
        }
        Ok(ChunkResponse::Progress { bytes_acked: st.held })
    }
}
