#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::{Command, Stdio};

struct Run {
    code: i32,
    stdout: String,
    stderr: String,
}

fn ush_path() -> String {
    std::env::var("CARGO_BIN_EXE_ush").unwrap_or_else(|_| env!("CARGO_BIN_EXE_ush").to_string())
}

/// 以非交互模式运行 ush，`script` 从标准输入送入。启动文件指向一个不存在的路径。
fn run_ush(dir: &Path, script: &str) -> Run {
    run_ush_with_rc(dir, &dir.join(".no_ushrc"), script)
}

fn run_ush_with_rc(dir: &Path, rc: &Path, script: &str) -> Run {
    let mut child = Command::new(ush_path())
        .current_dir(dir)
        .env("USH_LOG_DIR", dir.join(".logs"))
        .env("USH_HISTORY", dir.join(".history"))
        .env("USH_RC", rc)
        .env_remove("USH_LOG_STDERR")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn ush");
    // The shell may exit before consuming stdin (e.g. `logout` in the rc file).
    if let Err(e) = child.stdin.take().unwrap().write_all(script.as_bytes()) {
        assert_eq!(e.kind(), std::io::ErrorKind::BrokenPipe, "write stdin: {e}");
    }
    let output = child.wait_with_output().expect("wait ush");
    Run {
        code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }
}

#[test]
fn echo_builtin() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_ush(dir.path(), "echo a b c\necho\n");
    assert_eq!(run.code, 0);
    assert_eq!(run.stdout, "a b c\n\n");
}

#[test]
fn builtin_feeds_external_through_pipe() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_ush(dir.path(), "echo hi | cat\necho a b | wc -w\n");
    assert_eq!(run.stdout.lines().collect::<Vec<_>>(), ["hi", "2"]);
}

#[test]
fn last_stage_builtin_ignores_pipe_input() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_ush(dir.path(), "echo x | echo y\n");
    assert_eq!(run.stdout, "y\n");
}

#[test]
fn large_output_does_not_deadlock() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_ush(dir.path(), "head -c 2000000 /dev/zero | cat | cat | wc -c\n");
    assert_eq!(run.stdout.trim(), "2000000");
}

#[test]
fn output_file_truncates_and_appends() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.txt");

    let run = run_ush(dir.path(), "echo first > out.txt\necho second > out.txt\n");
    assert_eq!(fs::read_to_string(&out).unwrap(), "second\n");
    assert!(run.stdout.is_empty(), "{}", run.stdout);

    let run = run_ush(dir.path(), "echo third >> out.txt\necho fourth >> out.txt\necho back\n");
    assert_eq!(fs::read_to_string(&out).unwrap(), "second\nthird\nfourth\n");
    assert_eq!(run.stdout, "back\n");
}

#[test]
fn input_file_redirect() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("in.txt"), "one\ntwo\n").unwrap();

    let run = run_ush(dir.path(), "wc -l < in.txt\ncat < missing.txt\necho after\n");
    assert_eq!(run.stdout.lines().collect::<Vec<_>>(), ["2", "after"]);
    assert!(
        run.stderr.contains("missing.txt: No such file or directory"),
        "{}",
        run.stderr
    );
}

#[test]
fn stderr_follows_stdout_redirects() {
    let dir = tempfile::tempdir().unwrap();
    let script = "ls /zz_no_such_dir >& err.txt\n\
                  ls /zz_no_such_dir |& wc -l\n\
                  ls /zz_no_such_dir | wc -l\n";
    let run = run_ush(dir.path(), script);

    let captured = fs::read_to_string(dir.path().join("err.txt")).unwrap();
    assert!(captured.contains("zz_no_such_dir"), "{}", captured);
    assert_eq!(run.stdout.lines().collect::<Vec<_>>(), ["1", "0"]);
    assert!(run.stderr.contains("zz_no_such_dir"));
}

#[test]
fn unresolved_command_aborts_only_its_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_ush(dir.path(), "echo skipped | zz_not_a_real_cmd\necho next\n");
    assert_eq!(run.code, 0);
    assert_eq!(run.stdout, "next\n");
    assert!(run.stderr.contains("zz_not_a_real_cmd: command not found"));
}

#[test]
fn path_names_are_checked() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("plain.sh");
    fs::write(&script, "#!/bin/sh\necho run\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o644)).unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();

    let run = run_ush(dir.path(), "./plain.sh\n./sub\n./nothing\n");
    assert!(run.stdout.is_empty());
    assert!(run.stderr.contains("ush: ./plain.sh: Permission denied"));
    assert!(run.stderr.contains("ush: ./sub: Is a directory"));
    assert!(run.stderr.contains("ush: ./nothing: No such file or directory"));

    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    let run = run_ush(dir.path(), "./plain.sh\n");
    assert_eq!(run.stdout, "run\n");
}

#[test]
fn environment_is_shared_with_children() {
    let dir = tempfile::tempdir().unwrap();
    let script = "setenv USH_TEST_VAR bar\n\
                  printenv USH_TEST_VAR\n\
                  echo $USH_TEST_VAR ${USH_TEST_VAR}x\n\
                  unsetenv USH_TEST_VAR\n\
                  printenv USH_TEST_VAR\n\
                  echo [$USH_TEST_VAR]\n";
    let run = run_ush(dir.path(), script);
    assert_eq!(run.stdout, "bar\nbar barx\n[]\n");
}

#[test]
fn where_lists_every_match() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    fs::create_dir(&a).unwrap();
    fs::create_dir(&b).unwrap();
    fs::write(a.join("tool"), "").unwrap();
    fs::write(b.join("tool"), "").unwrap();

    let script = format!(
        "setenv PATH {}:{}\nwhere tool\nwhere cd\nwhere zz_missing\n",
        a.display(),
        b.display()
    );
    let run = run_ush(dir.path(), &script);
    assert_eq!(
        run.stdout,
        format!(
            "{};{}\ncd: shell built-in command\n",
            a.join("tool").display(),
            b.join("tool").display()
        )
    );
    assert!(run.stderr.contains("zz_missing: command not found"));
}

#[test]
fn cd_changes_where_children_run() {
    let dir = tempfile::tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    fs::create_dir(root.join("sub")).unwrap();
    fs::write(root.join("sub/file.txt"), "hello\n").unwrap();

    let run = run_ush(&root, "cd sub\npwd\ncat file.txt\necho x > made.txt\n");
    assert_eq!(run.stdout, format!("{}\nhello\n", root.join("sub").display()));
    assert!(root.join("sub/made.txt").exists());

    let run = run_ush(&root, "cd zz_missing\npwd\n");
    assert!(run.stderr.contains("cd: zz_missing:"), "{}", run.stderr);
    assert_eq!(run.stdout, format!("{}\n", root.display()));
}

#[test]
fn cd_without_argument_goes_home() {
    let dir = tempfile::tempdir().unwrap();
    let user = nix::unistd::User::from_uid(nix::unistd::Uid::current())
        .unwrap()
        .expect("passwd entry");
    let Ok(home) = fs::canonicalize(&user.dir) else {
        eprintln!("SKIP: home directory missing");
        return;
    };

    let run = run_ush(dir.path(), "cd\npwd\n");
    assert_eq!(run.stdout, format!("{}\n", home.display()));
}

#[test]
fn end_sentinel_stops_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_ush(dir.path(), "echo one; end; echo skipped\necho two\n");
    assert_eq!(run.code, 0);
    assert_eq!(run.stdout, "one\n");
}

#[test]
fn logout_exits_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_ush(dir.path(), "echo a\nlogout\necho b\n");
    assert_eq!(run.code, 0);
    assert_eq!(run.stdout, "a\n");
}

#[test]
fn quoting_and_syntax_errors() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_ush(
        dir.path(),
        "echo 'a  $HOME' \"b  c\"\necho |\necho still running\n",
    );
    assert_eq!(run.stdout, "a  $HOME b  c\nstill running\n");
    assert!(run.stderr.contains("syntax error"), "{}", run.stderr);
}

#[test]
fn no_prompt_without_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_ush(dir.path(), "");
    assert_eq!(run.code, 0);
    assert!(run.stdout.is_empty());
}

#[test]
fn upstream_dies_quietly_when_downstream_exits() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_ush(dir.path(), "yes | head -n 1\n");
    assert_eq!(run.stdout, "y\n");
    assert!(run.stderr.is_empty(), "{}", run.stderr);
}

#[test]
fn builtin_redirection_restores_streams() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_ush(dir.path(), "where zz_missing >& err.txt\necho b\nwhere zz_other\n");

    let captured = fs::read_to_string(dir.path().join("err.txt")).unwrap();
    assert_eq!(captured, "zz_missing: command not found\n");
    assert_eq!(run.stdout, "b\n");
    assert_eq!(run.stderr, "zz_other: command not found\n");
}

#[test]
fn failed_input_redirect_gives_downstream_eof() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_ush(dir.path(), "cat < missing.txt | wc -l\necho next\n");
    assert_eq!(run.stdout.lines().collect::<Vec<_>>(), ["0", "next"]);
    assert!(run.stderr.contains("missing.txt: No such file or directory"));
}

#[test]
fn builtin_in_the_middle_of_a_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_ush(dir.path(), "echo a | echo b | cat\n");
    assert_eq!(run.stdout, "b\n");
}

fn host_name() -> String {
    nix::unistd::gethostname()
        .unwrap()
        .to_string_lossy()
        .into_owned()
}

#[test]
fn startup_file_runs_before_input() {
    let dir = tempfile::tempdir().unwrap();
    let rc = dir.path().join(".ushrc");
    fs::write(&rc, "setenv FROM_RC yes\necho rc line\n").unwrap();

    let run = run_ush_with_rc(dir.path(), &rc, "printenv FROM_RC\n");
    let host = host_name();
    assert_eq!(run.stdout, format!("{host}%\n{host}%\nrc line\nyes\n"));
}

#[test]
fn end_in_startup_file_only_stops_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let rc = dir.path().join(".ushrc");
    fs::write(&rc, "echo a\nend\necho skipped\n").unwrap();

    let run = run_ush_with_rc(dir.path(), &rc, "echo c\n");
    let host = host_name();
    assert_eq!(run.stdout, format!("{host}%\na\n{host}%\nc\n"));
}

#[test]
fn logout_in_startup_file_exits() {
    let dir = tempfile::tempdir().unwrap();
    let rc = dir.path().join(".ushrc");
    fs::write(&rc, "logout\n").unwrap();

    let run = run_ush_with_rc(dir.path(), &rc, "echo never\n");
    assert_eq!(run.code, 0);
    assert_eq!(run.stdout, format!("{}%\n", host_name()));
}

