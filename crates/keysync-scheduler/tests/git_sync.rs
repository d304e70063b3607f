//! Runs the real pipeline against a local bare repository.
//!
//! Skipped when `git` is not on PATH.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use keysync_scheduler::{
    Configuration, EmptyCommitPolicy, HashTokenSource, JitteredTimer, PipelineConfig,
    RecordingObserver, RunOutcome, Scheduler, Severity, ShellCommandRunner, SyncPipeline,
    WaitUnit,
};

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A bare "remote" plus a working copy with one commit on `main`.
fn setup_repos(root: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let remote = root.join("remote.git");
    let work = root.join("work");
    std::fs::create_dir_all(&remote).unwrap();
    std::fs::create_dir_all(&work).unwrap();

    git(&remote, &["init", "--bare", "--quiet"]);
    git(&work, &["init", "--quiet"]);
    git(&work, &["checkout", "-b", "main", "--quiet"]);
    git(&work, &["config", "user.email", "keysync@example.com"]);
    git(&work, &["config", "user.name", "keysync"]);
    git(&work, &["config", "commit.gpgsign", "false"]);
    git(
        &work,
        &["remote", "add", "origin", remote.to_str().unwrap()],
    );
    std::fs::write(work.join("README"), "keysync test\n").unwrap();
    git(&work, &["add", "."]);
    git(&work, &["commit", "--quiet", "-m", "init"]);
    git(&work, &["push", "--quiet", "origin", "main"]);

    (remote, work)
}

#[tokio::test]
async fn test_run_pushes_token_to_remote() {
    if !git_available() {
        eprintln!("git not found, skipping");
        return;
    }

    let root = tempfile::tempdir().unwrap();
    let (remote, work) = setup_repos(root.path());

    let observer = Arc::new(RecordingObserver::new());
    let runner = Arc::new(ShellCommandRunner::new(observer.clone()).with_working_dir(&work));
    let pipeline = SyncPipeline::new(
        runner,
        observer.clone(),
        PipelineConfig {
            empty_commit: EmptyCommitPolicy::Benign,
            ..Default::default()
        },
    );
    let config = Configuration {
        iteration_count: 2,
        wait_base: 0.01,
        wait_unit: WaitUnit::Seconds,
        problem_wait_minutes: 1,
    };
    let scheduler = Scheduler::new(config, Arc::new(HashTokenSource::default()), Arc::new(pipeline))
        .with_token_path(work.join("key.txt"))
        .with_timer(JitteredTimer::new(0.0, Duration::from_millis(10)));

    let outcome = scheduler.run(observer.as_ref()).await;

    assert_eq!(outcome, RunOutcome::Finished { iterations: 2 });
    assert!(
        observer.logs(Severity::Warning).is_empty(),
        "unexpected failures: {:?}",
        observer.logs(Severity::Warning)
    );
    assert!(
        observer
            .logs(Severity::Success)
            .contains(&"Success: git push origin main".to_string())
    );

    let local = std::fs::read_to_string(work.join("key.txt")).unwrap();
    assert_eq!(local.len(), 64);
    assert_eq!(git(&remote, &["show", "main:key.txt"]), local);
    assert!(git(&remote, &["rev-list", "--count", "main"]).parse::<u32>().unwrap() >= 2);
    assert_eq!(git(&remote, &["log", "-1", "--format=%s", "main"]), "update");
}

#[tokio::test]
async fn test_missing_remote_exhausts_attempts() {
    if !git_available() {
        eprintln!("git not found, skipping");
        return;
    }

    let root = tempfile::tempdir().unwrap();
    let work = root.path().join("work");
    std::fs::create_dir_all(&work).unwrap();
    git(&work, &["init", "--quiet"]);

    let observer = Arc::new(RecordingObserver::new());
    let runner = Arc::new(ShellCommandRunner::new(observer.clone()).with_working_dir(&work));
    let pipeline = SyncPipeline::new(
        runner,
        observer.clone(),
        PipelineConfig {
            max_attempts: 3,
            retry_delay: Duration::from_millis(10),
            ..Default::default()
        },
    );

    let failure = pipeline.synchronize().await.unwrap_err();

    assert_eq!(failure.attempts.len(), 3);
    // Every attempt stops at the pull; nothing else is logged as a success.
    assert!(observer.logs(Severity::Success).is_empty());
    assert_eq!(observer.logs(Severity::Error).len(), 3);
    assert!(failure.last_diagnostic().is_some());
}
