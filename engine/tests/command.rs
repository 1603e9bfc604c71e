mod support;

use engine::{run_shell_command, CommandOptions, EngineError, ExecOutput};
use support::MemoryRemote;

#[test]
fn test_nonzero_exit_is_a_result() {
    let remote = MemoryRemote::new();
    remote.set_exec_output(ExecOutput {
        exit_code: 2,
        signal: None,
        stdout: Vec::new(),
        stderr: b"ls: cannot access '/nope': No such file or directory\n".to_vec(),
    });

    let result = run_shell_command(&remote, "ls /nope", &CommandOptions::default())
        .expect("A failing command should still produce a result");

    assert_eq!(result.exit_code, 2);
    assert!(!result.success());
    assert!(result.stderr.contains("No such file"));
    assert_eq!(remote.executed(), vec!["bash -ic 'ls /nope'"]);
}

#[test]
fn test_output_is_captured() {
    let remote = MemoryRemote::new();
    remote.set_exec_output(ExecOutput {
        exit_code: 0,
        signal: None,
        stdout: b"sub-01\nsub-02\n".to_vec(),
        stderr: Vec::new(),
    });

    let options = CommandOptions {
        shell: "sh".to_string(),
        interactive: false,
        pty: false,
    };
    let result = run_shell_command(&remote, "ls /srv/ds", &options).expect("Command should run");

    assert!(result.success());
    assert_eq!(result.stdout, "sub-01\nsub-02\n");
    assert_eq!(remote.executed(), vec!["sh -c 'ls /srv/ds'"]);
}

#[test]
fn test_channel_open_failure() {
    // No canned output configured, so opening the exec channel fails
    let remote = MemoryRemote::new();

    let err = run_shell_command(&remote, "uptime", &CommandOptions::default()).unwrap_err();
    match err {
        EngineError::CommandChannelError { command, .. } => assert_eq!(command, "uptime"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(remote.executed().is_empty());
}
