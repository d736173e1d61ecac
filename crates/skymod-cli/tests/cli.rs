use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::Command;
use std::sync::mpsc;
use std::thread;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::json;
use skymod_repo::RepoBuilder;
use tempfile::TempDir;

/// The binary run in an empty directory with no inherited configuration.
fn skymod(dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("skymod"));
    cmd.current_dir(dir.path());
    for var in [
        "SKYMOD_USER",
        "SKYMOD_APP_KEY",
        "SKYMOD_PDS_URL",
        "SKYMOD_PLC_URL",
        "SKYMOD_TIMEOUT_SECS",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn help_lists_commands_and_credentials() {
    let tmp = TempDir::new().expect("tmpdir");
    skymod(&tmp)
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("list")
                .and(predicate::str::contains("mute"))
                .and(predicate::str::contains("--my-user"))
                .and(predicate::str::contains("--app-key")),
        );
    skymod(&tmp)
        .args(["mute", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("from-user-blocks")
                .and(predicate::str::contains("from-file"))
                .and(predicate::str::contains("from-url")),
        );
}

#[test]
fn missing_credentials_is_a_usage_error() {
    let tmp = TempDir::new().expect("tmpdir");
    skymod(&tmp)
        .args(["list", "mutes"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains(
            "both the --my-user and --app-key flags must be provided",
        ));
    skymod(&tmp)
        .args(["--my-user", "@me.example", "mute", "users", "@someone.example"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("the --app-key flag must be provided"));
}

#[test]
fn credentials_come_from_dotenv() {
    let tmp = TempDir::new().expect("tmpdir");
    fs::write(tmp.path().join(".env"), "SKYMOD_USER=me.example\n").unwrap();
    skymod(&tmp)
        .args(["list", "mutes"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("the --app-key flag must be provided"));
}

#[test]
fn argument_errors_exit_with_usage_status() {
    let tmp = TempDir::new().expect("tmpdir");
    skymod(&tmp).args(["list", "blocks"]).assert().code(2);
    skymod(&tmp)
        .args(["list", "blocks", "@a.example", "--verbose", "--oneline"])
        .assert()
        .code(2);
    skymod(&tmp).args(["block", "users", "@a.example"]).assert().code(2);
}

#[test]
fn bad_user_list_names_file_and_line() {
    let tmp = TempDir::new().expect("tmpdir");
    fs::write(
        tmp.path().join("list.txt"),
        "did:plc:aaa alice\n@bob.example\n",
    )
    .unwrap();
    skymod(&tmp)
        .args(["--my-user", "me", "--app-key", "k", "mute", "from-file", "list.txt"])
        .assert()
        .code(1)
        .stderr(
            predicate::str::contains("parsing list.txt")
                .and(predicate::str::contains("line 2"))
                .and(predicate::str::contains("@bob.example")),
        );
}

#[test]
fn missing_user_list_file_fails() {
    let tmp = TempDir::new().expect("tmpdir");
    skymod(&tmp)
        .args(["--my-user", "me", "--app-key", "k", "mute", "from-file", "nope.txt"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("mute from file"));
}

fn read_request(socket: &mut TcpStream) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 4096];
    loop {
        let read = socket.read(&mut chunk).expect("read request");
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
        let text = String::from_utf8_lossy(&buffer);
        if let Some(head_end) = text.find("\r\n\r\n") {
            let content_length = text[..head_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buffer.len() >= head_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buffer).to_string()
}

struct Reply {
    path: &'static str,
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
}

fn json_reply(path: &'static str, body: serde_json::Value) -> Reply {
    Reply {
        path,
        status: 200,
        content_type: "application/json",
        body: body.to_string().into_bytes(),
    }
}

fn status_reply(path: &'static str, status: u16) -> Reply {
    Reply {
        path,
        status,
        content_type: "text/plain",
        body: Vec::new(),
    }
}

/// Answers consecutive connections with `replies`, checking each request
/// line against the reply's path fragment and handing back the raw request.
fn spawn_sequence_server(replies: Vec<Reply>) -> (String, mpsc::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind listener");
    let address = listener.local_addr().expect("listener addr");
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for reply in replies {
            let (mut socket, _) = listener.accept().expect("accept");
            let request = read_request(&mut socket);
            let first_line = request.lines().next().unwrap_or_default().to_string();
            let _ = tx.send(request);
            assert!(
                first_line.contains(reply.path),
                "expected path '{}', first line: {first_line}",
                reply.path
            );
            let status_text = match reply.status {
                200 => "OK",
                404 => "Not Found",
                500 => "Internal Server Error",
                _ => "Error",
            };
            let head = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                reply.status,
                status_text,
                reply.content_type,
                reply.body.len()
            );
            socket.write_all(head.as_bytes()).expect("write head");
            socket.write_all(&reply.body).expect("write body");
            socket.flush().expect("flush");
        }
    });
    (format!("http://{}", address), rx)
}

/// Access token whose payload carries the app-password scope.
const APP_PASSWORD_JWT: &str =
    "eyJhbGciOiJIUzI1NiJ9.eyJzY29wZSI6ImNvbS5hdHByb3RvLmFwcFBhc3MifQ.c2ln";

fn session_reply() -> Reply {
    json_reply(
        "/xrpc/com.atproto.server.createSession",
        json!({
            "did": "did:plc:me",
            "handle": "me.example",
            "accessJwt": APP_PASSWORD_JWT,
            "refreshJwt": "refresh",
        }),
    )
}

fn block_record(subject: &str) -> serde_json::Value {
    json!({
        "$type": "app.bsky.graph.block",
        "subject": subject,
        "createdAt": "2024-01-01T00:00:00.000Z",
    })
}

fn blocks_car() -> Vec<u8> {
    RepoBuilder::new("did:plc:alice")
        .record("app.bsky.graph.block/3ka", &block_record("did:plc:t1"))
        .unwrap()
        .record("app.bsky.graph.block/3kb", &block_record("did:plc:gone"))
        .unwrap()
        .record("app.bsky.graph.block/3kc", &block_record("did:plc:t1"))
        .unwrap()
        .to_car()
        .unwrap()
}

fn blocks_replies() -> Vec<Reply> {
    vec![
        json_reply(
            "/xrpc/com.atproto.identity.resolveHandle?handle=alice.example",
            json!({"did": "did:plc:alice"}),
        ),
        Reply {
            path: "/xrpc/com.atproto.sync.getRepo",
            status: 200,
            content_type: "application/vnd.ipld.car",
            body: blocks_car(),
        },
        json_reply(
            "/did:plc:t1",
            json!({"id": "did:plc:t1", "alsoKnownAs": ["at://t1.example"]}),
        ),
        json_reply(
            "/did:plc:gone",
            json!({"id": "did:plc:gone", "alsoKnownAs": []}),
        ),
    ]
}

#[test]
fn list_blocks_against_mock_services() {
    let (base, _requests) = spawn_sequence_server(blocks_replies());

    let tmp = TempDir::new().expect("tmpdir");
    let assert = skymod(&tmp)
        .args(["--pds", base.as_str(), "--plc", base.as_str(), "--json"])
        .args(["list", "blocks", "@alice.example"])
        .assert()
        .success();
    let output = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let value: serde_json::Value = serde_json::from_str(output.trim()).expect("json");
    assert_eq!(
        value["data"],
        json!([{"handle": "t1.example", "did": "did:plc:t1"}])
    );
    assert_eq!(value["meta"]["without_handle"], json!(["did:plc:gone"]));
}

#[test]
fn mute_from_file_mutes_only_new_identifiers() {
    let (base, requests) = spawn_sequence_server(vec![
        session_reply(),
        json_reply(
            "/xrpc/app.bsky.graph.getMutes",
            json!({"mutes": [{"did": "did:plc:aaa", "handle": "alice.example"}]}),
        ),
        json_reply("/xrpc/app.bsky.graph.muteActor", json!({})),
    ]);
    let tmp = TempDir::new().expect("tmpdir");
    fs::write(
        tmp.path().join("list.txt"),
        "did:plc:aaa alice\ndid:plc:bbb bob\n",
    )
    .unwrap();

    skymod(&tmp)
        .args(["--pds", base.as_str(), "--my-user", "me.example", "--app-key", "xxxx-xxxx"])
        .args(["mute", "from-file", "list.txt"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("muting users from list.txt...")
                .and(predicate::str::contains("1 of 2 users already muted"))
                .and(predicate::str::contains("successfully muted 1 users")),
        );

    let requests: Vec<String> = requests.try_iter().collect();
    assert_eq!(requests.len(), 3);
    assert!(requests[1].to_ascii_lowercase().contains(&format!(
        "authorization: bearer {}",
        APP_PASSWORD_JWT.to_ascii_lowercase()
    )));
    assert!(requests[2].contains("did:plc:bbb"));
    assert!(!requests[2].contains("did:plc:aaa"));
}

#[test]
fn mute_from_file_reports_when_nothing_is_left() {
    let (base, requests) = spawn_sequence_server(vec![
        session_reply(),
        json_reply(
            "/xrpc/app.bsky.graph.getMutes",
            json!({"mutes": [{"did": "did:plc:aaa", "handle": "alice.example"}]}),
        ),
    ]);
    let tmp = TempDir::new().expect("tmpdir");
    fs::write(tmp.path().join("list.txt"), "did:plc:aaa\n").unwrap();

    skymod(&tmp)
        .args(["--pds", base.as_str(), "--my-user", "me.example", "--app-key", "xxxx-xxxx"])
        .args(["mute", "from-file", "list.txt"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "all 1 users already muted, nothing more to do",
        ));
    assert_eq!(requests.try_iter().count(), 2);
}

#[test]
fn mute_from_url_fetches_every_list_before_login() {
    let (base, requests) = spawn_sequence_server(vec![
        Reply {
            path: "/lists/a.txt",
            status: 200,
            content_type: "text/plain",
            body: b"did:plc:aaa\n".to_vec(),
        },
        status_reply("/lists/b.txt", 404),
    ]);
    let first = format!("{base}/lists/a.txt");
    let second = format!("{base}/lists/b.txt");
    let tmp = TempDir::new().expect("tmpdir");

    skymod(&tmp)
        .args(["--pds", base.as_str(), "--my-user", "me.example", "--app-key", "xxxx-xxxx"])
        .args(["mute", "from-url", first.as_str(), second.as_str()])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(format!(
            "resource not found: {second}"
        )));

    let requests: Vec<String> = requests.try_iter().collect();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| !r.contains("createSession")));
}

#[test]
fn mute_from_url_reports_unexpected_status() {
    let (base, _requests) = spawn_sequence_server(vec![status_reply("/lists/a.txt", 500)]);
    let url = format!("{base}/lists/a.txt");
    let tmp = TempDir::new().expect("tmpdir");

    skymod(&tmp)
        .args(["--my-user", "me.example", "--app-key", "xxxx-xxxx"])
        .args(["mute", "from-url", url.as_str()])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(format!(
            "unexpected status code 500 when fetching {url}"
        )));
}

#[test]
fn mute_from_user_blocks_resolves_subjects_first() {
    let mut replies = vec![session_reply()];
    replies.extend(blocks_replies());
    replies.push(json_reply("/xrpc/app.bsky.graph.getMutes", json!({"mutes": []})));
    replies.push(json_reply("/xrpc/app.bsky.graph.muteActor", json!({})));
    let (base, requests) = spawn_sequence_server(replies);
    let tmp = TempDir::new().expect("tmpdir");

    let assert = skymod(&tmp)
        .args(["--pds", base.as_str(), "--plc", base.as_str(), "--json"])
        .args(["--my-user", "me.example", "--app-key", "xxxx-xxxx"])
        .args(["mute", "from-user-blocks", "@alice.example"])
        .assert()
        .success();
    let output = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let value: serde_json::Value = serde_json::from_str(output.trim()).expect("json");
    assert_eq!(
        value["data"],
        json!([{
            "source": "blocks",
            "report": {"requested": 1, "already_satisfied": 0, "newly_applied": 1},
        }])
    );
    assert_eq!(value["meta"]["without_handle"], json!(["did:plc:gone"]));

    let requests: Vec<String> = requests.try_iter().collect();
    assert_eq!(requests.len(), 7);
    let mute = &requests[6];
    assert!(mute.contains("app.bsky.graph.muteActor"));
    assert!(mute.contains("did:plc:t1"));
    assert!(!mute.contains("did:plc:gone"));
}
