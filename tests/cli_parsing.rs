use std::path::PathBuf;

use clap::Parser;
use devhost::cli::{Cli, Commands};

#[test]
fn test_parse_up_flags() {
    let cli = Cli::try_parse_from(["devhost", "up", "--dry-run", "--detach"]).unwrap();
    match cli.command {
        Commands::Up(args) => {
            assert!(args.dry_run);
            assert!(args.detach);
        }
        _ => panic!("Wrong top-level command"),
    }
    assert!(!cli.json);
}

#[test]
fn test_parse_global_options_before_subcommand() {
    let cli = Cli::try_parse_from([
        "devhost",
        "--json",
        "--config",
        "ci.yaml",
        "--file",
        "stacks/shop.yaml",
        "plan",
        "--env",
    ])
    .unwrap();

    assert!(cli.json);
    assert_eq!(cli.config, Some(PathBuf::from("ci.yaml")));
    assert_eq!(cli.file, Some(PathBuf::from("stacks/shop.yaml")));
    assert!(matches!(cli.command, Commands::Plan(ref args) if args.env));
}

#[test]
fn test_parse_init_with_path() {
    let cli = Cli::try_parse_from(["devhost", "init", "--force", "demo"]).unwrap();
    match cli.command {
        Commands::Init(args) => {
            assert!(args.force);
            assert_eq!(args.path, PathBuf::from("demo"));
        }
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_diagnose_bucket() {
    let cli = Cli::try_parse_from(["devhost", "diagnose", "--bucket", "uploads"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Diagnose(ref args) if args.bucket.as_deref() == Some("uploads")
    ));
}

#[test]
fn test_validate_takes_no_arguments() {
    assert!(Cli::try_parse_from(["devhost", "validate"]).is_ok());
    assert!(Cli::try_parse_from(["devhost", "validate", "extra"]).is_err());
}

#[test]
fn test_unknown_subcommand_is_rejected() {
    assert!(Cli::try_parse_from(["devhost", "deploy"]).is_err());
}
