//! Integration of the front half of the pipeline: lexing, parsing, and
//! expansion driven together, plus builtin round-trips through `run_line`
//! that never spawn a process.

use minish::env::Environment;
use minish::input::BufferedReader;
use minish::lexer::tokenize;
use minish::parser::{parse, AstNode, RedirKind};
use minish::{expander, run_line, ShellState};
use std::io::Cursor;

fn shell_with(vars: &[(&str, &str)]) -> ShellState {
    let mut env = Environment::new();
    for (name, value) in vars {
        env.set(name, value);
    }
    ShellState::with_env(env)
}

fn run(line: &str, shell: &mut ShellState) -> i32 {
    let mut reader = BufferedReader::new(Cursor::new(String::new()));
    run_line(line, shell, &mut reader)
}

fn expand(line: &str, shell: &ShellState) -> AstNode {
    let mut ast = parse(tokenize(line).unwrap()).unwrap();
    expander::expand_tree(&mut ast, shell);
    ast
}

#[test]
fn test_full_front_pipeline_on_a_mixed_line() {
    let shell = shell_with(&[("FILE", "notes.txt"), ("WHO", "ada")]);
    let ast = expand("cat < $FILE | grep \"$WHO\" '$WHO' > out.log", &shell);

    let AstNode::Pipe(left, right) = ast else {
        panic!("expected a pipe at the top");
    };
    let AstNode::Command(cat) = *left else {
        panic!("expected the cat command");
    };
    assert_eq!(cat.argv, ["cat"]);
    assert_eq!(cat.redirects[0].kind, RedirKind::In);
    assert_eq!(cat.redirects[0].path.as_deref(), Some("notes.txt"));

    let AstNode::Command(grep) = *right else {
        panic!("expected the grep command");
    };
    assert_eq!(grep.argv, ["grep", "ada", "$WHO"]);
    assert_eq!(grep.redirects[0].kind, RedirKind::Out);
    assert_eq!(grep.redirects[0].path.as_deref(), Some("out.log"));
}

#[test]
fn test_operator_precedence_survives_expansion() {
    let shell = shell_with(&[("A", "a")]);
    let ast = expand("$A | x && y || z", &shell);
    let AstNode::OrIf(left, _) = ast else {
        panic!("expected || at the top");
    };
    let AstNode::AndIf(pipe, _) = *left else {
        panic!("expected && below ||");
    };
    assert!(matches!(*pipe, AstNode::Pipe(_, _)));
}

#[test]
fn test_export_unset_export_is_idempotent() {
    let mut first = shell_with(&[]);
    run("export X=1", &mut first);
    run("unset X", &mut first);
    run("export X=1", &mut first);

    let mut second = shell_with(&[]);
    run("export X=1", &mut second);

    let lhs: Vec<_> = first.env.iter().cloned().collect();
    let rhs: Vec<_> = second.env.iter().cloned().collect();
    assert_eq!(lhs, rhs);
}

#[test]
fn test_export_then_expansion_round_trip() {
    let mut shell = shell_with(&[]);
    assert_eq!(run("export GREETING=hello", &mut shell), 0);

    let ast = expand("echo $GREETING \"$GREETING\" '$GREETING'", &shell);
    let AstNode::Command(cmd) = ast else {
        panic!("expected a command");
    };
    assert_eq!(cmd.argv, ["echo", "hello", "hello", "$GREETING"]);
}

#[test]
fn test_unset_variable_expansions() {
    let shell = shell_with(&[]);

    let AstNode::Command(bare) = expand("echo $X", &shell) else {
        panic!("expected a command");
    };
    assert_eq!(bare.argv, ["echo"]);

    let AstNode::Command(quoted) = expand("echo \"$X\"", &shell) else {
        panic!("expected a command");
    };
    assert_eq!(quoted.argv, ["echo", ""]);

    let AstNode::Command(single) = expand("echo '$X'", &shell) else {
        panic!("expected a command");
    };
    assert_eq!(single.argv, ["echo", "$X"]);
}

#[test]
fn test_exit_status_reaches_next_expansion() {
    let mut shell = shell_with(&[("PATH", "/usr/bin:/bin")]);
    run("false", &mut shell);
    let AstNode::Command(cmd) = expand("echo $?", &shell) else {
        panic!("expected a command");
    };
    assert_eq!(cmd.argv, ["echo", "1"]);
}

#[test]
fn test_syntax_errors_leave_no_partial_state() {
    let mut shell = shell_with(&[]);
    assert_eq!(run("export BROKEN=1 |", &mut shell), 2);
    // the line never executed, so the assignment never happened
    assert!(!shell.env.contains("BROKEN"));
}

#[test]
fn test_exit_stops_the_rest_of_the_list() {
    let mut shell = shell_with(&[]);
    assert_eq!(run("exit 0 && export AFTER=1", &mut shell), 0);
    assert_eq!(shell.pending_exit, Some(0));
    assert!(!shell.env.contains("AFTER"));
}

#[test]
fn test_exit_requests_shell_termination() {
    let mut shell = shell_with(&[]);
    shell.last_status = 4;
    assert_eq!(run("exit", &mut shell), 4);
    assert_eq!(shell.pending_exit, Some(4));

    let mut shell = shell_with(&[]);
    assert_eq!(run("exit 256", &mut shell), 0);
    assert_eq!(shell.pending_exit, Some(0));

    let mut shell = shell_with(&[]);
    assert_eq!(run("exit -1", &mut shell), 255);
    assert_eq!(shell.pending_exit, Some(255));

    let mut shell = shell_with(&[]);
    assert_eq!(run("exit 1 2", &mut shell), 1);
    assert_eq!(shell.pending_exit, None);
}
