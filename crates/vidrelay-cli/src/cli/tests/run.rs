//! Tests for the run subcommand.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use std::path::Path;

#[test]
fn cli_parse_run_defaults() {
    match parse(&["vidrelay", "run", "batch.toml"]) {
        CliCommand::Run {
            manifest,
            workers,
            segment_size,
            chunk_size,
            no_ledger,
            no_playlists,
            results,
        } => {
            assert_eq!(manifest, Path::new("batch.toml"));
            assert!(workers.is_none());
            assert!(segment_size.is_none());
            assert!(chunk_size.is_none());
            assert!(!no_ledger);
            assert!(!no_playlists);
            assert!(results.is_none());
        }
        _ => panic!("expected Run"),
    }
}

#[test]
fn cli_parse_run_overrides() {
    match parse(&[
        "vidrelay",
        "run",
        "batch.toml",
        "--workers",
        "8",
        "--segment-size",
        "1048576",
        "--chunk-size",
        "262144",
        "--no-ledger",
        "--no-playlists",
        "--results",
        "/tmp/out.jsonl",
    ]) {
        CliCommand::Run {
            workers,
            segment_size,
            chunk_size,
            no_ledger,
            no_playlists,
            results,
            ..
        } => {
            assert_eq!(workers, Some(8));
            assert_eq!(segment_size, Some(1_048_576));
            assert_eq!(chunk_size, Some(262_144));
            assert!(no_ledger);
            assert!(no_playlists);
            assert_eq!(results.as_deref(), Some(Path::new("/tmp/out.jsonl")));
        }
        _ => panic!("expected Run with overrides"),
    }
}

#[test]
fn cli_run_requires_manifest() {
    assert!(Cli::try_parse_from(["vidrelay", "run"]).is_err());
}

#[test]
fn cli_run_rejects_non_numeric_workers() {
    assert!(Cli::try_parse_from(["vidrelay", "run", "b.toml", "--workers", "many"]).is_err());
}
