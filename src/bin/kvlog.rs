//! interactive shell over a kvlog store file
//! run `kvlog <FILE>` and type `help` at the prompt for the command list

use std::io::{self, BufRead, Write};
use std::process::exit;

use clap::{crate_version, App, Arg};
use kvlog::KvStore;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn main() {
    subscriber_config();

    let matches = App::new("kvlog")
        .version(crate_version!())
        .about("a durable key-value store backed by an append-only log")
        .arg(
            Arg::with_name("FILE")
                .help("path of the log file to open or create")
                .default_value("kvlog.db")
                .index(1),
        )
        .get_matches();

    let path = matches.value_of("FILE").unwrap();
    let store = match KvStore::open(path) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("{:?}", e);
            exit(1);
        }
    };

    if let Err(e) = repl(&store) {
        eprintln!("{:?}", e);
        exit(1);
    }
}

/// reads commands from stdin and runs them against the store until `exit`
/// or end of input
fn repl(store: &KvStore) -> kvlog::Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        let mut words = line.split_whitespace();

        match words.next() {
            None => {}
            Some("exit") => break,
            Some("help") => print_help(),
            Some("put") => match (parse_key(words.next()), words.next()) {
                (Some(key), Some(value)) => store.put(key, value.as_bytes())?,
                _ => println!("usage: put <key> <value>"),
            },
            Some("get") => match parse_key(words.next()) {
                Some(key) => match store.get(key)? {
                    Some(value) => println!("{}", String::from_utf8_lossy(&value)),
                    None => println!("(nil)"),
                },
                None => println!("usage: get <key>"),
            },
            Some("del") => match parse_key(words.next()) {
                Some(key) => store.remove(key)?,
                None => println!("usage: del <key>"),
            },
            Some(other) => println!(
                "Unknown command: {}. Type 'help' for more information.",
                other
            ),
        }
    }
    Ok(())
}

/// parses a u32 key argument, if one was given and is numeric
fn parse_key(word: Option<&str>) -> Option<u32> {
    word.and_then(|w| w.parse().ok())
}

fn print_help() {
    println!(
        "commands:\n  \
         put <key> <value> - store a key-value pair\n  \
         get <key>         - print the value for a key, or (nil)\n  \
         del <key>         - delete a key\n  \
         help              - show this message\n  \
         exit              - quit"
    );
}

/// configures a tracing subscriber that will log to STDERR
fn subscriber_config() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting tracing default subscriber failed");
}
