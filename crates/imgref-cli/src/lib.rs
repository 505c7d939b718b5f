//! imgref command-line host
//!
//! Supplies the on-disk collaborators (document store, operation log, audit
//! trail) to the core engine and maps subcommands onto engine calls.

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
pub use commands::{build_engine, load_config, run};

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use imgref_core::{FormatConversion, ImgrefConfig, NamingPolicy, SyntaxKind};
    use std::fs;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    fn vault() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("notes")).unwrap();
        fs::create_dir_all(root.join("assets")).unwrap();
        fs::write(
            root.join("notes/trip.md"),
            "# Trip\n![[beach.png|At the beach]]\n![map](../assets/map.png)\n",
        )
        .unwrap();
        fs::write(root.join("assets/beach.png"), [0u8]).unwrap();
        fs::write(root.join("assets/map.png"), [0u8]).unwrap();
        temp_dir
    }

    fn cli(root: &std::path::Path, args: &[&str]) -> Cli {
        let mut argv = vec!["imgref", "--root", root.to_str().unwrap()];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_convert_arguments() {
        let parsed = Cli::try_parse_from([
            "imgref", "convert", "--policy", "relative", "--syntax", "html", "--dry-run",
        ])
        .unwrap();

        match parsed.command {
            Commands::Convert {
                policy,
                syntax,
                dry_run,
            } => {
                assert_eq!(policy, Some(NamingPolicy::Relative));
                assert_eq!(syntax, Some(SyntaxKind::Html));
                assert!(dry_run);
            }
            other => panic!("unexpected command {:?}", other),
        }

        assert!(Cli::try_parse_from(["imgref", "convert", "--policy", "closest"]).is_err());
    }

    #[test]
    fn test_load_config_from_vault_root() {
        let temp_dir = vault();
        let root = temp_dir.path();

        assert_eq!(load_config(root, None).unwrap(), ImgrefConfig::default());

        fs::write(
            root.join(".imgref.yaml"),
            "rewrite:\n  naming_policy: absolute\n",
        )
        .unwrap();
        let config = load_config(root, None).unwrap();
        assert_eq!(config.rewrite.naming_policy, NamingPolicy::Absolute);

        fs::write(root.join("bad.yaml"), "rewrite: [").unwrap();
        assert!(load_config(root, Some(&root.join("bad.yaml"))).is_err());
    }

    #[tokio::test]
    async fn test_convert_uses_configured_policy() {
        let temp_dir = vault();
        let root = temp_dir.path();
        fs::write(
            root.join(".imgref.yaml"),
            "rewrite:\n  naming_policy: absolute\n",
        )
        .unwrap();

        run(cli(root, &["convert"]), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            fs::read_to_string(root.join("notes/trip.md")).unwrap(),
            "# Trip\n![[assets/beach.png|At the beach]]\n![map](assets/map.png)\n"
        );
        let audit = fs::read_to_string(root.join(".imgref/audit.jsonl")).unwrap();
        assert_eq!(audit.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let temp_dir = vault();
        let root = temp_dir.path();
        let before = fs::read_to_string(root.join("notes/trip.md")).unwrap();

        run(
            cli(root, &["convert", "--policy", "absolute", "--dry-run"]),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(fs::read_to_string(root.join("notes/trip.md")).unwrap(), before);
        assert!(!root.join(".imgref/audit.jsonl").exists());
    }

    #[tokio::test]
    async fn test_mv_updates_references_and_logs_the_move() {
        let temp_dir = vault();
        let root = temp_dir.path();

        run(
            cli(root, &["mv", "assets/beach.png", "photos/sand.png"]),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(root.join("photos/sand.png").exists());
        assert!(!root.join("assets/beach.png").exists());
        assert_eq!(
            fs::read_to_string(root.join("notes/trip.md")).unwrap(),
            "# Trip\n![[sand.png|At the beach]]\n![map](../assets/map.png)\n"
        );

        let log = fs::read_to_string(root.join(".imgref/operations.jsonl")).unwrap();
        assert!(log.contains("\"newPath\":\"photos/sand.png\""));
    }

    #[tokio::test]
    async fn test_recover_after_external_rename() {
        let temp_dir = vault();
        let root = temp_dir.path();

        // Renamed outside imgref, then reported with `renamed --dry-run`,
        // which logs the move without touching notes.
        fs::rename(root.join("assets/map.png"), root.join("assets/world.png")).unwrap();
        run(
            cli(root, &["renamed", "assets/map.png", "assets/world.png", "--dry-run"]),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(fs::read_to_string(root.join("notes/trip.md"))
            .unwrap()
            .contains("../assets/map.png"));

        run(cli(root, &["recover"]), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            fs::read_to_string(root.join("notes/trip.md")).unwrap(),
            "# Trip\n![[beach.png|At the beach]]\n![map](assets/world.png)\n"
        );
    }

    #[tokio::test]
    async fn test_cancelled_batch_is_an_error() {
        let temp_dir = vault();
        let root = temp_dir.path();
        let cancel = CancellationToken::new();
        let engine = build_engine(root, ImgrefConfig::default(), cancel.clone());

        let edits = engine
            .plan_format_conversion(FormatConversion::policy(NamingPolicy::Absolute))
            .await
            .unwrap();
        assert!(!edits.is_empty());

        cancel.cancel();
        let result = commands::apply_or_print(&engine, &edits, false, false).await;
        assert!(result.is_err());
        assert!(fs::read_to_string(root.join("notes/trip.md"))
            .unwrap()
            .contains("![[beach.png|At the beach]]"));
    }

    #[tokio::test]
    async fn test_mv_refuses_to_overwrite() {
        let temp_dir = vault();
        let root = temp_dir.path();

        let result = run(
            cli(root, &["mv", "assets/beach.png", "assets/map.png"]),
            CancellationToken::new(),
        )
        .await;
        assert!(result.is_err());
        assert!(root.join("assets/beach.png").exists());
    }
}
