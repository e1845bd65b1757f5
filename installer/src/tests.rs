//! Tests for the formula CLI entrypoint.

use super::*;
use netrain_formula_installer::source::FetchError;
use netrain_formula_installer::test_utils::{FakeBuild, FakeCargo, NETRAIN_SCRIPT};
use rstest::{fixture, rstest};
use std::path::PathBuf;
use tempfile::TempDir;

struct TempDirs {
    root: PathBuf,
}

impl BaseDirs for TempDirs {
    fn data_local_dir(&self) -> Option<PathBuf> {
        Some(self.root.join("data"))
    }

    fn cache_dir(&self) -> Option<PathBuf> {
        Some(self.root.join("cache"))
    }
}

/// Downloader that must never be reached.
struct OfflineDownloader;

impl SourceDownloader for OfflineDownloader {
    fn download(&self, url: &str, _dest: &std::path::Path) -> std::result::Result<(), FetchError> {
        Err(FetchError::Download {
            url: url.to_owned(),
            reason: "network disabled in tests".to_owned(),
        })
    }
}

struct Harness {
    temp: TempDir,
    dirs: TempDirs,
    cargo: FakeCargo,
}

impl Harness {
    fn root(&self) -> Utf8PathBuf {
        Utf8PathBuf::try_from(self.temp.path().to_path_buf()).expect("utf-8 temp path")
    }

    fn source_dir(&self) -> Utf8PathBuf {
        let dir = self.root().join("netrain-src");
        std::fs::create_dir_all(&dir).expect("source dir");
        std::fs::write(dir.join("Cargo.toml"), "[package]\nname = \"netrain\"\n")
            .expect("manifest");
        dir
    }

    fn run(&self, args: &[&str]) -> (Result<()>, String, String) {
        let cli = Cli::try_parse_from(std::iter::once("netrain-formula").chain(args.iter().copied()))
            .expect("arguments parse");
        let services = Services {
            dirs: &self.dirs,
            executor: &self.cargo,
            downloader: &OfflineDownloader,
        };
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let result = run(&cli, &services, &mut stdout, &mut stderr);
        (
            result,
            String::from_utf8(stdout).expect("stdout is UTF-8"),
            String::from_utf8(stderr).expect("stderr is UTF-8"),
        )
    }
}

#[fixture]
fn harness() -> Harness {
    let temp = tempfile::tempdir().expect("temp dir");
    let dirs = TempDirs {
        root: temp.path().to_path_buf(),
    };
    Harness {
        temp,
        dirs,
        cargo: FakeCargo::new("netrain", FakeBuild::Succeed(NETRAIN_SCRIPT.to_owned())),
    }
}

#[test]
fn exit_code_for_run_result_returns_zero_on_success() {
    let mut stderr = Vec::new();
    let exit_code = exit_code_for_run_result(Ok(()), &mut stderr);
    assert_eq!(exit_code, 0);
    assert!(stderr.is_empty());
}

#[test]
fn exit_code_for_run_result_prints_error_and_returns_one() {
    let err = InstallerError::ChecksumUnpinned {
        package: "netrain".to_owned(),
    };

    let mut stderr = Vec::new();
    let exit_code = exit_code_for_run_result(Err(err), &mut stderr);
    assert_eq!(exit_code, 1);

    let stderr_text = String::from_utf8(stderr).expect("stderr was not UTF-8");
    assert!(stderr_text.starts_with("error: netrain has no pinned sha256 checksum"));
}

#[rstest]
fn caveats_prints_privileged_and_demo_commands(harness: Harness) {
    let (result, stdout, _) = harness.run(&["caveats"]);
    result.expect("caveats succeed");
    assert_eq!(
        stdout,
        concat!(
            "NetRain requires root privileges to capture network packets:\n",
            "  sudo netrain\n",
            "\n",
            "To run in demo mode without root privileges:\n",
            "  netrain --demo\n",
        )
    );
}

#[rstest]
fn deps_json_lists_both_roles(harness: Harness) {
    let (result, stdout, _) = harness.run(&["deps", "--json"]);
    result.expect("deps succeed");
    let value: serde_json::Value = serde_json::from_str(&stdout).expect("valid json");
    let names: Vec<_> = value
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|entry| entry["name"].as_str())
        .collect();
    assert_eq!(names, ["rust", "libpcap"]);
}

#[rstest]
fn default_prefix_is_under_data_dir(harness: Harness) {
    let (result, stdout, _) = harness.run(&["info"]);
    result.expect("info succeeds");
    let expected = harness
        .root()
        .join("data/netrain-formula/Cellar/netrain/0.2.0");
    assert!(stdout.contains(&format!("Prefix: {expected}")));
    assert!(stdout.contains("Installed: no"));
}

#[rstest]
fn release_install_refuses_unpinned_formula(harness: Harness) {
    let prefix = harness.root().join("keg");
    let (result, _, _) = harness.run(&["install", "--prefix", prefix.as_str()]);
    assert!(matches!(result, Err(InstallerError::ChecksumUnpinned { .. })));
    assert_eq!(harness.cargo.build_count(), 0);
}

#[rstest]
fn install_prints_success_and_caveats(harness: Harness) {
    let prefix = harness.root().join("keg");
    let source = harness.source_dir();

    let (result, stdout, stderr) = harness.run(&[
        "install",
        "--prefix",
        prefix.as_str(),
        "--source-dir",
        source.as_str(),
        "-j",
        "2",
    ]);

    result.expect("install succeeds");
    assert!(stdout.starts_with("Successfully installed netrain 0.2.0 to "));
    assert!(stdout.contains("sudo netrain"));
    assert!(stderr.contains("Installing NetRain 0.2.0"));
    let build = harness
        .cargo
        .calls()
        .into_iter()
        .find(|args| args.first().is_some_and(|a| a == "install"))
        .expect("cargo install ran");
    assert!(build.windows(2).any(|pair| pair == ["--jobs", "2"]));
}

#[rstest]
fn quiet_install_keeps_stderr_clean(harness: Harness) {
    let prefix = harness.root().join("keg");
    let source = harness.source_dir();

    let (result, _, stderr) = harness.run(&[
        "-q",
        "install",
        "--prefix",
        prefix.as_str(),
        "--source-dir",
        source.as_str(),
    ]);

    result.expect("install succeeds");
    assert!(stderr.is_empty());
}

#[cfg(unix)]
#[rstest]
fn test_after_install_passes(harness: Harness) {
    let prefix = harness.root().join("keg");
    let source = harness.source_dir();
    let (installed, _, _) = harness.run(&[
        "install",
        "--prefix",
        prefix.as_str(),
        "--source-dir",
        source.as_str(),
    ]);
    installed.expect("install succeeds");

    let (result, stdout, _) = harness.run(&[
        "test",
        "--prefix",
        prefix.as_str(),
        "--grace-period-ms",
        "200",
    ]);

    result.expect("verification passes");
    assert!(stdout.contains("version: ok"));
    assert!(stdout.contains("lifecycle: ok"));
    assert!(stdout.ends_with("2 of 2 checks passed\n"));
}

#[cfg(unix)]
#[rstest]
fn strict_exit_fails_version_check(harness: Harness) {
    let prefix = harness.root().join("keg");
    let source = harness.source_dir();
    let (installed, _, _) = harness.run(&[
        "install",
        "--prefix",
        prefix.as_str(),
        "--source-dir",
        source.as_str(),
    ]);
    installed.expect("install succeeds");

    let (result, stdout, _) = harness.run(&[
        "test",
        "--prefix",
        prefix.as_str(),
        "--grace-period-ms",
        "200",
        "--strict-exit",
    ]);

    assert!(matches!(
        result,
        Err(InstallerError::VerificationFailed { ref failed }) if failed == &["version".to_owned()]
    ));
    assert!(stdout.contains("version: FAILED"));
}

#[rstest]
fn test_without_install_reports_not_installed(harness: Harness) {
    let prefix = harness.root().join("empty");
    let (result, _, _) = harness.run(&["test", "--prefix", prefix.as_str()]);
    assert!(matches!(result, Err(InstallerError::NotInstalled { .. })));
}

#[rstest]
fn formula_override_is_loaded(harness: Harness) {
    let formula = harness.root().join("custom.toml");
    std::fs::write(
        &formula,
        r#"
[package]
name = "netrain"
display_name = "NetRain"
url = "https://example.test/netrain-9.9.9.tar.gz"
sha256 = "PLACEHOLDER_SHA256"
license = "MIT"
version = "9.9.9"

[caveats]
privilege_command = "doas netrain"
"#,
    )
    .expect("write formula");

    let (result, stdout, _) = harness.run(&["--formula", formula.as_str(), "caveats"]);
    result.expect("caveats succeed");
    assert!(stdout.contains("  doas netrain\n"));
}

#[rstest]
fn missing_formula_file_is_an_error(harness: Harness) {
    let formula = harness.root().join("absent.toml");
    let (result, _, _) = harness.run(&["--formula", formula.as_str(), "deps"]);
    assert!(matches!(result, Err(InstallerError::Formula(_))));
}

#[test]
fn harness_overrides_replace_formula_timing() {
    let descriptor = PackageDescriptor::builtin().expect("bundled formula parses");
    let args = TestArgs {
        grace_period_ms: Some(500),
        reap_timeout_ms: Some(250),
        strict_exit: true,
        ..TestArgs::default()
    };

    let config = harness_config_for(&descriptor, &args);

    assert_eq!(config.grace_period, Duration::from_millis(500));
    assert_eq!(config.reap_timeout, Duration::from_millis(250));
    assert!(!config.allow_nonzero_exit);
    assert_eq!(config.overall_timeout, Duration::from_secs(30));
}

#[rstest]
#[case::release(&[][..], SourceRequest::Release)]
#[case::head(&["--head"][..], SourceRequest::Head)]
#[case::archive(&["--archive", "/a.tar.gz"][..], SourceRequest::Archive(Utf8PathBuf::from("/a.tar.gz")))]
#[case::directory(&["--source-dir", "/src"][..], SourceRequest::Directory(Utf8PathBuf::from("/src")))]
fn install_request_follows_source_flags(#[case] flags: &[&str], #[case] expected: SourceRequest) {
    let cli = Cli::parse_from(
        ["netrain-formula", "-vv", "install"]
            .into_iter()
            .chain(flags.iter().copied()),
    );
    let Command::Install(args) = &cli.command else {
        panic!("expected Install");
    };

    let request = install_request_for(&cli, args);

    assert_eq!(request.source, expected);
    assert_eq!(request.build.verbosity, 2);
}
