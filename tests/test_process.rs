// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The shmpipe binary in separate processes: exit codes, crash release of
// the role locks and the termination barrier.

mod common;

use std::ffi::OsStr;
use std::io::Read;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use common::{pattern, wait_for_value, Pipe};
use shmpipe::config::{KEY_PATH_ENV, PROJECT_ID_ENV};
use shmpipe::{Sem, Sender, BLOCK_SIZE};

const PATIENCE: Duration = Duration::from_secs(10);

fn shmpipe(pipe: &Pipe) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_shmpipe"));
    cmd.env(KEY_PATH_ENV, pipe.config.key_path())
        .env(PROJECT_ID_ENV, pipe.config.project_id.to_string())
        .env("RUST_LOG", "off")
        .stdin(Stdio::null());
    cmd
}

fn spawn_sender(pipe: &Pipe, file: &Path) -> Child {
    shmpipe(pipe)
        .arg(file)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn sender")
}

fn spawn_receiver(pipe: &Pipe) -> Child {
    shmpipe(pipe)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn receiver")
}

fn write_input(dir: &tempfile::TempDir, data: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join("input.bin");
    std::fs::write(&path, data).expect("write input");
    path
}

fn process_round_trip(len: usize) {
    let pipe = Pipe::new();
    let dir = tempfile::tempdir().unwrap();
    let data = pattern(len);
    let input = write_input(&dir, &data);

    let receiver = spawn_receiver(&pipe);
    let sender = spawn_sender(&pipe, &input);

    let out = receiver.wait_with_output().expect("receiver output");
    assert!(out.status.success(), "receiver: {}", String::from_utf8_lossy(&out.stderr));
    let sent = sender.wait_with_output().expect("sender output");
    assert!(sent.status.success(), "sender: {}", String::from_utf8_lossy(&sent.stderr));
    assert!(out.stdout == data, "stdout differs for len {len}");
}

#[test]
fn process_round_trip_empty() {
    process_round_trip(0);
}

#[test]
fn process_round_trip_exact_block() {
    process_round_trip(BLOCK_SIZE);
}

#[test]
fn process_round_trip_many_blocks() {
    process_round_trip(BLOCK_SIZE * 200 + 77);
}

#[test]
fn wrong_argument_count_fails() {
    let pipe = Pipe::new();
    let out = shmpipe(&pipe).args(["a", "b"]).output().expect("run");
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Wrong argument count"));
}

#[test]
fn missing_input_fails_before_touching_locks() {
    let pipe = Pipe::new();
    let res = pipe.resources();
    let out = shmpipe(&pipe).arg("/nonexistent/shmpipe/input").output().expect("run");
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("open"));
    assert_eq!(res.sems().value(Sem::WriterLock).unwrap(), 1);
}

#[test]
fn non_utf8_file_name_is_reported_not_panicked() {
    let pipe = Pipe::new();
    let res = pipe.resources();
    let path = OsStr::from_bytes(b"/nonexistent/shmpipe/no\xffsuch");
    let out = shmpipe(&pipe).arg(path).output().expect("run");
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert_eq!(out.status.code(), Some(1), "{stderr}");
    assert!(stderr.contains("shmpipe: open"), "{stderr}");
    assert!(!stderr.contains("panicked"), "{stderr}");
    assert_eq!(res.sems().value(Sem::WriterLock).unwrap(), 1);
}

#[test]
fn bad_project_id_is_warned_about() {
    let pipe = Pipe::new();
    let out = shmpipe(&pipe)
        .env(PROJECT_ID_ENV, "not-a-number")
        .env("RUST_LOG", "shmpipe=warn")
        .env("NO_COLOR", "1")
        .arg("/nonexistent/shmpipe/input")
        .output()
        .expect("run");
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("SHMPIPE_PROJECT_ID is not an integer"), "{stderr}");
}

#[test]
fn killed_sender_releases_writer_lock() {
    let pipe = Pipe::new();
    let dir = tempfile::tempdir().unwrap();
    let data = pattern(BLOCK_SIZE * 3);
    let input = write_input(&dir, &data);
    let res = pipe.resources();

    // Parks in the rendezvous: no receiver yet.
    let mut stuck = spawn_sender(&pipe, &input);
    assert!(wait_for_value(&res, Sem::WriterLock, 0, PATIENCE));

    // A second sender queues behind it.
    let (tx, rx) = mpsc::channel();
    let config = pipe.config.clone();
    let waiting = thread::spawn(move || {
        let res = shmpipe::acquire_resources(&config).expect("acquire");
        let sender = Sender::attach(&res).expect("attach");
        tx.send(()).unwrap();
        drop(sender);
    });
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

    stuck.kill().expect("kill");
    stuck.wait().expect("reap");
    rx.recv_timeout(PATIENCE).expect("second sender never got the lock");
    waiting.join().unwrap();

    let c = res.sems().snapshot().unwrap();
    assert_eq!(c[Sem::WriterLock], 1);
    assert_eq!(c[Sem::Working], 0);

    // The pipe still works afterwards.
    let receiver = spawn_receiver(&pipe);
    let sender = spawn_sender(&pipe, &input);
    let out = receiver.wait_with_output().unwrap();
    assert!(out.status.success());
    assert!(sender.wait_with_output().unwrap().status.success());
    assert!(out.stdout == data);
}

#[test]
fn killed_receiver_fails_sender() {
    let pipe = Pipe::new();
    let dir = tempfile::tempdir().unwrap();
    // Far more than a pipe buffer: the receiver blocks on its unread stdout.
    let input = write_input(&dir, &pattern(BLOCK_SIZE * 1024));
    let res = pipe.resources();

    let mut receiver = spawn_receiver(&pipe);
    let mut sender = spawn_sender(&pipe, &input);
    assert!(wait_for_value(&res, Sem::CloseLock, 1, PATIENCE));
    thread::sleep(Duration::from_millis(100));
    assert!(sender.try_wait().unwrap().is_none(), "sender ran ahead of a blocked receiver");

    receiver.kill().unwrap();
    receiver.wait().unwrap();

    let status = sender.wait().unwrap();
    assert!(!status.success());
    let mut stderr = String::new();
    sender.stderr.take().unwrap().read_to_string(&mut stderr).unwrap();
    assert!(stderr.contains("counterpart is no longer attached"), "{stderr}");

    let c = res.sems().snapshot().unwrap();
    assert_eq!(c[Sem::ReaderLock], 1);
    assert_eq!(c[Sem::WriterLock], 1);
    assert_eq!(c[Sem::CloseLock], 0);
    assert_eq!(c[Sem::Working], 0);
}

#[test]
fn sender_waits_for_receiver_process_exit() {
    let pipe = Pipe::new();
    let res = pipe.resources();

    // Consecutive sessions, each with the receiver frozen for a different
    // time after the stream is complete.
    for pause_ms in [0u64, 50, 200] {
        let receiver = spawn_receiver(&pipe);
        let pid = receiver.id() as libc::pid_t;

        let mut sender = Sender::attach(&res).expect("attach");
        sender.rendezvous().expect("rendezvous");

        unsafe { libc::kill(pid, libc::SIGSTOP) };
        sender.stream(&mut std::io::empty()).expect("stream");

        thread::scope(|s| {
            let (tx, rx) = mpsc::channel();
            s.spawn(move || {
                sender.await_receiver_exit().expect("barrier");
                tx.send(()).unwrap();
                drop(sender);
            });

            assert!(
                rx.recv_timeout(Duration::from_millis(pause_ms)).is_err(),
                "sender released while the receiver is still alive (pause {pause_ms} ms)"
            );

            unsafe { libc::kill(pid, libc::SIGCONT) };
            let out = receiver.wait_with_output().expect("receiver");
            assert!(out.status.success());
            assert!(out.stdout.is_empty());
            rx.recv_timeout(PATIENCE).expect("sender never released");
        });

        let c = res.sems().snapshot().unwrap();
        assert_eq!(c[Sem::CloseLock], 0, "pause {pause_ms} ms");
        assert_eq!(c[Sem::Working], 0, "pause {pause_ms} ms");
    }
}
