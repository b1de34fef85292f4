use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

use declinare_corpus::filter::{self, EntryFilter, FilterMode, PosSinks};
use declinare_corpus::topn::{self, DEFAULT_LIMIT, ExtractOptions};
use declinare_corpus::{Corpus, FilterReport, LoadMode, count_lines, wordlist};
use declinare_types::{Pos, Script};

#[derive(Parser)]
#[command(name = "declinare-prep")]
#[command(about = "Prepare per-language quiz files from wiktextract dumps")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a dump into noun, verb and adjective files, entries unchanged.
    Split(FilterArgs),
    /// Like `split`, but reduce each entry to the fields the quiz reads.
    Trim(FilterArgs),
    /// Select the most frequent nouns of a noun file.
    Top(TopArgs),
    /// Print line counts for the `lines` keys of the language table.
    Count {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

#[derive(Args)]
struct FilterArgs {
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    lang: String,
    #[arg(long, default_value = "data")]
    out_dir: PathBuf,
    #[arg(long, value_enum, ignore_case = true, default_value_t = ScriptArg::Latin)]
    script: ScriptArg,
    #[arg(long, value_enum, ignore_case = true, default_value_t = LoadModeArg::Mmap)]
    load_mode: LoadModeArg,
}

#[derive(Args)]
struct TopArgs {
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    frequency: PathBuf,
    #[arg(long)]
    blacklist: Option<PathBuf>,
    #[arg(long)]
    output: PathBuf,
    /// Skip entries of other languages when the input is a mixed dump.
    #[arg(long)]
    lang: Option<String>,
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    limit: usize,
    /// Let form-of entries take part in the homograph check.
    #[arg(long, default_value_t = false)]
    count_form_of: bool,
    #[arg(long, value_enum, ignore_case = true, default_value_t = LoadModeArg::Mmap)]
    load_mode: LoadModeArg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ScriptArg {
    Latin,
    Cyrillic,
    Any,
}

impl From<ScriptArg> for Script {
    fn from(arg: ScriptArg) -> Self {
        match arg {
            ScriptArg::Latin => Script::Latin,
            ScriptArg::Cyrillic => Script::Cyrillic,
            ScriptArg::Any => Script::Any,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LoadModeArg {
    /// Memory-map the input.
    Mmap,
    /// Read the input into memory.
    Owned,
}

impl From<LoadModeArg> for LoadMode {
    fn from(arg: LoadModeArg) -> Self {
        match arg {
            LoadModeArg::Mmap => LoadMode::Mmap,
            LoadModeArg::Owned => LoadMode::Owned,
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Split(args) => {
            let report = run_filter(&args, FilterMode::Split)?;
            print_report(&args, &report);
        }
        Commands::Trim(args) => {
            let report = run_filter(&args, FilterMode::Trim)?;
            print_report(&args, &report);
        }
        Commands::Top(args) => {
            let written = run_top(&args)?;
            println!("Wrote {written} entries to {}", args.output.display());
        }
        Commands::Count { paths } => {
            for path in paths {
                println!("{}\t{}", count_lines(&path)?, path.display());
            }
        }
    }

    Ok(())
}

fn run_filter(args: &FilterArgs, mode: FilterMode) -> Result<FilterReport> {
    let load_mode = LoadMode::from(args.load_mode);
    let corpus = Corpus::open_with_mode(&args.input, load_mode)?;
    info!(
        "filtering {} for {} ({:?}, {:?})",
        args.input.display(),
        args.lang,
        mode,
        load_mode
    );
    let entry_filter = EntryFilter::new(&args.lang, args.script.into());
    let mut sinks = PosSinks::create(&args.out_dir, &args.lang)?;
    filter::run(&corpus, &entry_filter, mode, &mut sinks)
}

fn print_report(args: &FilterArgs, report: &FilterReport) {
    for pos in Pos::ALL {
        println!(
            "{:>8} {}",
            report.written.get(&pos).copied().unwrap_or(0),
            filter::output_path(&args.out_dir, &args.lang, pos).display()
        );
    }
    println!(
        "{} lines read, {} rejected, {} malformed",
        report.lines, report.rejected, report.malformed
    );
}

fn run_top(args: &TopArgs) -> Result<usize> {
    let corpus = Corpus::open_with_mode(&args.input, args.load_mode.into())?;
    let ranked = wordlist::load_frequency_list(&args.frequency)?;
    let blacklist = match &args.blacklist {
        Some(path) => wordlist::load_blacklist(path)?,
        None => Default::default(),
    };
    let options = ExtractOptions {
        limit: args.limit,
        lang_code: args.lang.clone(),
        count_form_of: args.count_form_of,
    };
    let top = topn::extract(&corpus, &ranked, &blacklist, &options);

    create_parent(&args.output)?;
    let file = File::create(&args.output)
        .with_context(|| format!("create {}", args.output.display()))?;
    top.write_jsonl(BufWriter::new(file))
        .with_context(|| format!("write {}", args.output.display()))?;
    Ok(top.len())
}

fn create_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir)
            .with_context(|| format!("create output dir {}", dir.display())),
        _ => Ok(()),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let max_level = env_filter
        .max_level_hint()
        .and_then(|hint| hint.into_level())
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_max_level(max_level)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = concat!(
        r#"{"word":"hus","lang_code":"sv","pos":"noun","senses":[{"glosses":["house"]}],"forms":[{"form":"husen","source":"declension","tags":["definite","plural"]},{"form":"husom","source":"declension","tags":["dated"]}]}"#,
        "\n",
        r#"{"word":"springa","lang_code":"sv","pos":"verb","senses":[{"glosses":["run"]}],"forms":[{"form":"sprang","source":"conjugation","tags":["past"]}]}"#,
        "\n",
        "not json\n",
    );

    #[test]
    fn parses_split_arguments() {
        let cli = Cli::try_parse_from([
            "declinare-prep",
            "split",
            "--input",
            "dump.jsonl",
            "--lang",
            "sh",
            "--script",
            "Cyrillic",
            "--load-mode",
            "owned",
        ])
        .unwrap();
        let Commands::Split(args) = cli.command else {
            panic!("expected split");
        };
        assert_eq!(args.lang, "sh");
        assert_eq!(args.out_dir, PathBuf::from("data"));
        assert_eq!(Script::from(args.script), Script::Cyrillic);
        assert_eq!(LoadMode::from(args.load_mode), LoadMode::Owned);
    }

    #[test]
    fn rejects_unknown_script() {
        let parsed = Cli::try_parse_from([
            "declinare-prep",
            "trim",
            "--input",
            "dump.jsonl",
            "--lang",
            "sv",
            "--script",
            "greek",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn top_defaults() {
        let cli = Cli::try_parse_from([
            "declinare-prep",
            "top",
            "--input",
            "sv_nouns.jsonl",
            "--frequency",
            "sv.txt",
            "--output",
            "out.jsonl",
        ])
        .unwrap();
        let Commands::Top(args) = cli.command else {
            panic!("expected top");
        };
        assert_eq!(args.limit, 500);
        assert!(!args.count_form_of);
        assert!(args.blacklist.is_none());
        assert_eq!(args.load_mode, LoadModeArg::Mmap);
    }

    #[test]
    fn trim_writes_per_pos_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("dump.jsonl");
        fs::write(&input, DUMP).unwrap();
        let args = FilterArgs {
            input,
            lang: "sv".into(),
            out_dir: dir.path().join("out"),
            script: ScriptArg::Latin,
            load_mode: LoadModeArg::Owned,
        };
        let report = run_filter(&args, FilterMode::Trim).unwrap();
        assert_eq!(report.lines, 3);
        assert_eq!(report.malformed, 1);
        assert_eq!(report.written_total(), 2);

        let nouns = fs::read_to_string(dir.path().join("out/sv_nouns.jsonl")).unwrap();
        assert!(nouns.contains("husen"));
        assert!(!nouns.contains("husom"));
        let adjs = fs::read_to_string(dir.path().join("out/sv_adjs.jsonl")).unwrap();
        assert!(adjs.is_empty());
    }

    #[test]
    fn top_writes_ranked_entries() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("sv_nouns.jsonl");
        fs::write(&input, DUMP).unwrap();
        let frequency = dir.path().join("sv.txt");
        fs::write(&frequency, "och\nhusen\nhus\n").unwrap();
        let args = TopArgs {
            input,
            frequency,
            blacklist: Some(dir.path().join("missing.txt")),
            output: dir.path().join("nested/sv_top.jsonl"),
            lang: None,
            limit: DEFAULT_LIMIT,
            count_form_of: false,
            load_mode: LoadModeArg::Mmap,
        };
        assert_eq!(run_top(&args).unwrap(), 1);
        let written = fs::read_to_string(&args.output).unwrap();
        assert_eq!(written.lines().count(), 1);
        assert!(written.starts_with(r#"{"word":"hus""#));
    }
}
