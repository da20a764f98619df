use minish::{
    run_line, signal, BufferedReader, InteractiveReader, LineReader, ReadOutcome, ShellState,
    SHELL_NAME,
};
use tracing_subscriber::EnvFilter;

const PROMPT: &str = "minish$ ";

fn main() {
    init_tracing();
    let mut shell = ShellState::new();
    let status = if shell.interactive {
        run_interactive(&mut shell)
    } else {
        run_piped(&mut shell)
    };
    std::process::exit(status & 0xff);
}

/// Debug tracing to stderr, off unless `MINISH_LOG` asks for it.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("MINISH_LOG").unwrap_or_else(|_| EnvFilter::new("off"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_banner() {
    println!(
        "\u{1b}[1;36m{SHELL_NAME}\u{1b}[0m {} (type `exit' or Ctrl-D to leave)",
        env!("CARGO_PKG_VERSION")
    );
}

fn run_interactive(shell: &mut ShellState) -> i32 {
    signal::init_interactive();
    print_banner();

    let mut reader = match InteractiveReader::new() {
        Ok(reader) => reader,
        Err(err) => {
            eprintln!("{SHELL_NAME}: {err}");
            return 1;
        }
    };

    loop {
        match reader.read_line(PROMPT) {
            Ok(ReadOutcome::Line(line)) => {
                if !line.trim().is_empty() {
                    reader.remember(&line);
                }
                run_line(&line, shell, &mut reader);
                if let Some(code) = shell.pending_exit {
                    return code;
                }
            }
            Ok(ReadOutcome::Interrupted) => {
                shell.last_status = 130;
            }
            Ok(ReadOutcome::Eof) => {
                eprintln!("exit");
                return shell.last_status;
            }
            Err(err) => {
                eprintln!("{SHELL_NAME}: {err}");
                return 1;
            }
        }
    }
}

/// Standard input is not a terminal: read lines without prompting.
fn run_piped(shell: &mut ShellState) -> i32 {
    let stdin = std::io::stdin();
    let mut reader = BufferedReader::new(stdin.lock());

    loop {
        match reader.read_line("") {
            Ok(ReadOutcome::Line(line)) => {
                run_line(&line, shell, &mut reader);
                if let Some(code) = shell.pending_exit {
                    return code;
                }
            }
            Ok(ReadOutcome::Eof) => return shell.last_status,
            Ok(ReadOutcome::Interrupted) => shell.last_status = 130,
            Err(err) => {
                eprintln!("{SHELL_NAME}: {err}");
                return 1;
            }
        }
    }
}
