//! Small CLI driver: read a file (or stdin), parse it, and either print
//! the reformatted document or a one-line parse summary.

use std::env;
use std::fs;
use std::io::{self, Read};
use std::process::ExitCode;

use htmlforge::events::Handlers;
use htmlforge::{format, parse, HtmlFormatOptions, ParserOptions};

fn usage() -> ! {
    eprintln!("usage: htmlforge [--stats] [--indent N] [FILE]");
    std::process::exit(2);
}

fn main() -> ExitCode {
    let mut args = env::args().skip(1);
    let mut path: Option<String> = None;
    let mut stats = false;
    let mut indent = 2usize;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--stats" => stats = true,
            "--indent" => {
                let Some(n) = args.next().and_then(|s| s.parse().ok()) else {
                    usage()
                };
                indent = n;
            }
            "-h" | "--help" => usage(),
            other if !other.starts_with('-') => path = Some(other.to_string()),
            _ => usage(),
        }
    }

    let input = match path {
        Some(p) => match fs::read_to_string(&p) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("htmlforge: cannot read {p}: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => {
            let mut buf = String::new();
            if let Err(e) = io::stdin().read_to_string(&mut buf) {
                eprintln!("htmlforge: cannot read stdin: {e}");
                return ExitCode::FAILURE;
            }
            buf
        }
    };

    let (mut dom, results) = parse(ParserOptions::default(), Handlers::new(), &input);

    if stats {
        println!(
            "lines={} errors={} implicitly_closed={} unclosed={}",
            results.lines, results.errors, results.implicitly_closed_tags, results.unclosed_tags
        );
        return ExitCode::SUCCESS;
    }

    let opts = HtmlFormatOptions {
        indent,
        ..HtmlFormatOptions::default()
    };
    format(&mut dom, &opts);
    print!("{}", dom.serialize(htmlforge::dom::ROOT));
    ExitCode::SUCCESS
}
