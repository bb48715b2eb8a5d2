use std::borrow::Cow;
use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::builder::ValueParser;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use regex::{Captures, Regex};
use tracing_subscriber::{fmt, EnvFilter};

use symbolic_usym::{
    parse_address, AddressResolution, AddressResolver, ResolvedSymbol, UsymSymbols,
};

/// Hexadecimal addresses in stack traces.
const ADDRESS_PATTERN: &str = r"\b0[xX][0-9a-fA-F]{1,16}\b";

fn format_symbol(symbol: &ResolvedSymbol, basenames: bool) -> String {
    let file = match basenames {
        true => symbol.base_name(),
        false => symbol.file_name(),
    };
    format!("{}:{}", file.unwrap_or("??"), symbol.line())
}

fn write_resolution<W: Write>(
    out: &mut W,
    resolution: Option<&AddressResolution>,
    inlinees: bool,
    basenames: bool,
) -> io::Result<()> {
    let resolution = match resolution {
        Some(resolution) => resolution,
        None => return writeln!(out, "??:0"),
    };

    if inlinees {
        for (i, symbol) in resolution.inlinees().enumerate() {
            if i > 0 {
                write!(out, " (inlined by) ")?;
            }
            writeln!(out, "{}", format_symbol(symbol, basenames))?;
        }
    } else {
        writeln!(out, "{}", format_symbol(resolution.symbol(), basenames))?;
    }

    if resolution.is_truncated() {
        eprintln!(
            "warning: inline frames of {:#x} are incomplete",
            resolution.original_address()
        );
    }

    Ok(())
}

fn write_records<W: Write>(
    out: &mut W,
    symbols: &UsymSymbols,
    basenames: bool,
) -> io::Result<()> {
    for symbol in symbols.all_records() {
        let parent = match symbol.parent_index() {
            Some(parent) => parent.to_string(),
            None => "-".to_owned(),
        };
        writeln!(
            out,
            "{:#x} {} method={} parent={}",
            symbol.address(),
            format_symbol(&symbol, basenames),
            symbol.method_index(),
            parent
        )?;
    }
    Ok(())
}

fn write_json<W: Write>(
    out: &mut W,
    resolver: &AddressResolver<'_>,
    addrs: &[String],
) -> Result<()> {
    let resolved = resolver.resolve_many_str(addrs);
    serde_json::to_writer_pretty(&mut *out, &resolved).context("failed to write json")?;
    writeln!(out)?;
    Ok(())
}

/// Replaces every `0x` address in `text` with the address followed by its source location.
///
/// Addresses that do not resolve are left untouched.
fn symbolicate_text<'t>(
    pattern: &Regex,
    resolver: &AddressResolver<'_>,
    text: &'t str,
    basenames: bool,
) -> Cow<'t, str> {
    pattern.replace_all(text, |caps: &Captures<'_>| {
        let token = &caps[0];
        match resolver.resolve_str(token) {
            Ok(Some(resolution)) => {
                let frames: Vec<_> = resolution
                    .inlinees()
                    .map(|symbol| format_symbol(symbol, basenames))
                    .collect();
                format!("{} ({})", token, frames.join(" <- "))
            }
            _ => token.to_owned(),
        }
    })
}

fn read_input(path: &str) -> Result<String> {
    if path == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("failed to read stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))
    }
}

fn execute(matches: &ArgMatches) -> Result<()> {
    // `required` part is handled by the Clap args definition themselves, so its safe to `unwrap`.
    let path = matches.get_one::<PathBuf>("path").unwrap();
    let image_base = matches.get_one::<u64>("base").copied().unwrap_or(0);
    let inlinees = matches.get_flag("inlinees");
    let basenames = matches.get_flag("basenames");

    let symbols = UsymSymbols::open(path).context("failed to open usym file")?;
    let resolver = AddressResolver::new(&symbols).with_image_base(image_base);

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if matches.get_flag("dump") {
        write_records(&mut out, &symbols, basenames)?;
        return Ok(());
    }

    if let Some(input) = matches.get_one::<String>("trace") {
        let pattern = Regex::new(ADDRESS_PATTERN).context("invalid address pattern")?;
        let text = read_input(input)?;
        write!(
            out,
            "{}",
            symbolicate_text(&pattern, &resolver, &text, basenames)
        )?;
        return Ok(());
    }

    let addrs: Vec<String> = match matches.get_many::<String>("addrs") {
        Some(addrs) => addrs.cloned().collect(),
        None => io::stdin()
            .lock()
            .lines()
            .collect::<Result<_, _>>()
            .context("failed to read addresses from stdin")?,
    };

    if matches.get_flag("json") {
        return write_json(&mut out, &resolver, &addrs);
    }

    for addr in addrs.iter().filter(|a| !a.trim().is_empty()) {
        match resolver.resolve_str(addr) {
            Ok(resolution) => {
                write_resolution(&mut out, resolution.as_ref(), inlinees, basenames)?
            }
            Err(e) => {
                eprintln!("{addr}: {e}");
                writeln!(out, "??:0")?;
            }
        }
    }

    Ok(())
}

fn parse_base(base: &str) -> Result<u64> {
    parse_address(base).context("unable to parse image base")
}

fn main() {
    let about = r#"usym_resolve translates il2cpp instruction addresses into managed file names and line numbers using a usym file.

Hexadecimal addresses are taken from the command line, or one per line from standard input. With --trace, a stack trace is read instead and every 0x address in it is annotated with its source location.

Set RUST_LOG to control diagnostic output."#;
    let matches = Command::new("usym_resolve")
        .about(about)
        .arg(
            Arg::new("path")
                .short('e')
                .long("exe")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("The usym file to resolve addresses with."),
        )
        .arg(
            Arg::new("base")
                .short('b')
                .long("base")
                .value_parser(ValueParser::new(parse_base))
                .help("Image base of the executable, subtracted from every address."),
        )
        .arg(
            Arg::new("inlinees")
                .short('i')
                .long("inlinees")
                .action(ArgAction::SetTrue)
                .help("Also print all methods the address was inlined into, innermost first."),
        )
        .arg(
            Arg::new("basenames")
                .short('s')
                .long("basenames")
                .action(ArgAction::SetTrue)
                .help("Display only the base of each file name."),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print resolved addresses as JSON. Unresolved addresses are omitted."),
        )
        .arg(
            Arg::new("dump")
                .long("dump")
                .action(ArgAction::SetTrue)
                .help("Print all line records in the usym file."),
        )
        .arg(
            Arg::new("trace")
                .long("trace")
                .value_name("FILE")
                .help("Annotate the addresses in a stack trace read from FILE, or stdin for `-`."),
        )
        .arg(
            Arg::new("addrs")
                .num_args(1..)
                .action(ArgAction::Append)
                .help("Addresses to be translated."),
        )
        .get_matches();

    // Tracing subscriber controlled by `RUST_LOG`
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .event_format(
            tracing_subscriber::fmt::format()
                .compact()
                .with_target(false)
                .without_time(),
        )
        .init();

    match execute(&matches) {
        Ok(()) => (),
        Err(e) => eprintln!("{:?}", e),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    use symbolic_testutils::UsymBuilder;

    fn symbols() -> UsymSymbols {
        let data = UsymBuilder::new()
            .record(0x100, 1, Some("Assets/Player.cs"), 10, None)
            .record(0x100, 2, Some("Assets/Player.cs"), 42, Some(0))
            .no_line_record(0x180)
            .build();

        UsymSymbols::parse(&data).unwrap()
    }

    fn output<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
    {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_symbolicate_text() {
        let symbols = symbols();
        let resolver = AddressResolver::new(&symbols).with_image_base(0x1000);
        let pattern = Regex::new(ADDRESS_PATTERN).unwrap();

        let text = "at Player.Update () [0x00000] in <unknown>:0\n  #1 pc 0x1104 libil2cpp.so\n  #2 pc 0x20 libil2cpp.so\n";
        let output = symbolicate_text(&pattern, &resolver, text, true);

        assert_eq!(
            output,
            "at Player.Update () [0x00000] in <unknown>:0\n  #1 pc 0x1104 (Player.cs:42 <- Player.cs:10) libil2cpp.so\n  #2 pc 0x20 libil2cpp.so\n"
        );
    }

    #[test]
    fn test_format_symbol() {
        let symbols = symbols();
        let symbol = symbols.resolve_record(&symbols.records()[0]);
        assert_eq!(format_symbol(&symbol, false), "Assets/Player.cs:10");
        assert_eq!(format_symbol(&symbol, true), "Player.cs:10");
    }

    #[test]
    fn test_write_resolution() {
        let symbols = symbols();
        let resolver = AddressResolver::new(&symbols);
        let resolution = resolver.resolve(0x104).unwrap();

        let leaf = output(|out| write_resolution(out, resolution.as_ref(), false, true));
        assert_eq!(leaf, "Player.cs:42\n");

        let inlined = output(|out| write_resolution(out, resolution.as_ref(), true, false));
        assert_eq!(
            inlined,
            "Assets/Player.cs:42\n (inlined by) Assets/Player.cs:10\n"
        );

        let missing = output(|out| write_resolution(out, None, true, false));
        assert_eq!(missing, "??:0\n");
    }

    #[test]
    fn test_write_records() {
        let symbols = symbols();
        let dump = output(|out| write_records(out, &symbols, true));
        assert_eq!(
            dump,
            "0x100 Player.cs:10 method=1 parent=-\n0x100 Player.cs:42 method=2 parent=0\n"
        );
    }

    #[test]
    fn test_write_json() {
        let symbols = symbols();
        let resolver = AddressResolver::new(&symbols);
        let addrs = vec!["0x104".to_owned(), "nope".to_owned(), "0x180".to_owned()];

        let mut out = Vec::new();
        write_json(&mut out, &resolver, &addrs).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();

        let resolved = json.as_array().unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0]["original_address"], 0x104);
        assert_eq!(resolved[0]["symbol"]["line"], 42);
        assert_eq!(resolved[0]["symbol"]["file_name"], "Assets/Player.cs");
        assert_eq!(resolved[0]["frames"].as_array().unwrap().len(), 2);
        assert_eq!(resolved[0]["truncated"], false);
    }
}
