use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command};
use dialoguer::Confirm;
use indoc::indoc;
use log::Level;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use nfcomx::uf::{CUF_TAG, format_uf};
use nfcomx::{
    ConsolidatedBatch, DocumentSource, ExtractionRequest, ResultRecord, consolidate_by_results,
    consolidate_by_uf, process_files, total_occurrences,
};

/// Tries to write a line to a given target, aborts program if fails.
macro_rules! try_writeln {
    ($($arg:tt)*) => (
        match writeln!($($arg)*) {
            Ok(_) => {},
            Err(e) => {
                eprintln!("{}", &e);
                std::process::exit(1)
            }
        }
    );
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum OutputFormat {
    Table,
    Json,
}

struct NfcomxDump {
    output: Box<dyn Write>,
    verbosity_level: Option<Level>,
}

impl NfcomxDump {
    fn from_cli_matches(matches: &ArgMatches) -> Result<Self> {
        let verbosity_level = match matches.get_count("verbose") {
            0 => None,
            1 => Some(Level::Info),
            2 => Some(Level::Debug),
            3 => Some(Level::Trace),
            _ => {
                eprintln!("using more than -vvv does not affect verbosity level");
                Some(Level::Trace)
            }
        };

        let output: Box<dyn Write> = if let Some(path) = matches.get_one::<String>("output-target")
        {
            let no_confirm = matches.get_flag("no-confirm-overwrite");
            Box::new(
                create_output_file(path, !no_confirm)
                    .with_context(|| format!("failed to create output file at `{path}`"))?,
            )
        } else {
            Box::new(io::stdout())
        };

        Ok(NfcomxDump {
            output,
            verbosity_level,
        })
    }

    fn try_to_initialize_logging(&self) {
        if let Some(level) = self.verbosity_level {
            match TermLogger::init(
                level.to_level_filter(),
                Config::default(),
                TerminalMode::Stderr,
                ColorChoice::Auto,
            ) {
                Ok(_) => {}
                Err(e) => eprintln!("Failed to initialize logging: {e:?}"),
            };
        }
    }

    fn run_extract(&mut self, matches: &ArgMatches) -> Result<()> {
        let sources = sources_from_matches(matches);
        let request = ExtractionRequest {
            tag_name: matches
                .get_one::<String>("tag")
                .expect("required argument")
                .clone(),
            context_tag: matches.get_one::<String>("context-tag").cloned(),
            filter_path: matches.get_one::<String>("filter-path").cloned(),
            filter_tag: matches.get_one::<String>("filter-tag").cloned(),
            filter_value: matches.get_one::<String>("filter-value").cloned(),
        };

        let format = match matches
            .get_one::<String>("output-format")
            .map(String::as_str)
        {
            Some("json") => OutputFormat::Json,
            _ => OutputFormat::Table,
        };

        let mut records = process_files(&sources, &request);

        // State codes are displayed as their UF abbreviation.
        if request.tag_name == CUF_TAG {
            for record in records.iter_mut().filter(|r| r.occurrences > 0) {
                record.value = format_uf(&record.value);
            }
        }

        match format {
            OutputFormat::Json => self.print_json(&records)?,
            OutputFormat::Table => self.print_table(&records)?,
        }

        Ok(())
    }

    fn run_consolidate(&mut self, matches: &ArgMatches) -> Result<()> {
        let sources = sources_from_matches(matches);
        let batch_number = matches
            .get_one::<String>("lote")
            .expect("required argument");

        let batch: ConsolidatedBatch = if let Some(uf) = matches.get_one::<String>("uf") {
            consolidate_by_uf(&sources, uf, batch_number)
        } else if let Some(tag) = matches.get_one::<String>("tag") {
            let request = ExtractionRequest {
                tag_name: tag.clone(),
                context_tag: matches.get_one::<String>("context-tag").cloned(),
                filter_path: matches.get_one::<String>("filter-path").cloned(),
                filter_tag: matches.get_one::<String>("filter-tag").cloned(),
                filter_value: matches.get_one::<String>("filter-value").cloned(),
            };
            let results = process_files(&sources, &request);
            consolidate_by_results(&sources, &results, batch_number)
        } else {
            bail!("either `--uf` or `--tag` must be supplied");
        };

        eprintln!(
            "{} record(s) consolidated into batch {}",
            batch.record_count, batch.batch_number
        );
        try_writeln!(self.output, "{}", batch.xml);

        Ok(())
    }

    fn print_table(&mut self, records: &[ResultRecord]) -> Result<()> {
        try_writeln!(
            self.output,
            "{:<40} | {:<12} | {:<40} | {:<40} | {}",
            "Arquivo", "TAG", "Filtro", "Valor", "Ocorrência"
        );

        for record in records {
            try_writeln!(
                self.output,
                "{:<40} | {:<12} | {:<40} | {:<40} | {}",
                record.source_name, record.tag, record.filter, record.value, record.occurrences
            );
        }

        try_writeln!(self.output, "TOTAL: {}", total_occurrences(records));
        Ok(())
    }

    fn print_json(&mut self, records: &[ResultRecord]) -> Result<()> {
        let document = serde_json::json!({
            "records": records,
            "total": total_occurrences(records),
        });
        serde_json::to_writer_pretty(&mut self.output, &document)?;
        try_writeln!(self.output);
        Ok(())
    }
}

fn sources_from_matches(matches: &ArgMatches) -> Vec<DocumentSource> {
    matches
        .get_many::<String>("INPUT")
        .expect("required argument")
        .map(DocumentSource::from_path)
        .collect()
}

fn create_output_file(path: impl AsRef<Path>, prompt: bool) -> Result<File> {
    let p = path.as_ref();

    if p.is_dir() {
        bail!("There is a directory at {}, refusing to overwrite", p.display());
    }

    if p.exists() {
        if prompt {
            let confirmed = Confirm::new()
                .with_prompt(format!(
                    "Are you sure you want to override output file at {}",
                    p.display()
                ))
                .default(false)
                .interact()?;
            if !confirmed {
                bail!("Cancelled");
            }
        }
        return Ok(File::create(p)?);
    }

    if let Some(parent) = p.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory at {}", parent.display()))?;
        }
    }

    Ok(File::create(p)?)
}

fn input_args() -> Vec<Arg> {
    vec![
        Arg::new("INPUT")
            .required(true)
            .num_args(1..)
            .value_parser(clap::value_parser!(String))
            .help("XML files to process, in order"),
        Arg::new("output-target")
            .long("output")
            .short('f')
            .help(
                "Writes output to the file specified instead of stdout, errors will still be printed to stderr. \
                 Will ask for confirmation before overwriting files, to allow overwriting, pass `--no-confirm-overwrite`. \
                 Will create parent directories if needed.",
            ),
        Arg::new("no-confirm-overwrite")
            .long("no-confirm-overwrite")
            .action(ArgAction::SetTrue)
            .help("When set, will not ask for confirmation before overwriting files, useful for automation"),
        Arg::new("verbose")
            .short('v')
            .action(ArgAction::Count)
            .help("-v - info, -vv - debug, -vvv - trace"),
    ]
}

fn filter_args() -> Vec<Arg> {
    vec![
        Arg::new("context-tag")
            .long("context-tag")
            .help("Common ancestor tag containing both the filter tag and the target tag, e.g. `infNFCom`"),
        Arg::new("filter-path")
            .long("filter-path")
            .help("Relative path from the context tag to the parent of the filter tag, e.g. `dest` or `ide/total`"),
        Arg::new("filter-tag")
            .long("filter-tag")
            .help("Tag used as the filter condition, e.g. `UF`"),
        Arg::new("filter-value")
            .long("filter-value")
            .help("Exact value the filter tag must have, e.g. `SP`"),
    ]
}

fn main() {
    let matches = Command::new("NFCom XML Dump")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Extracts tag values from large fiscal XML files and consolidates filtered record batches")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("extract")
                .about("Counts the values of a tag across the given files, with an optional conditional filter")
                .after_help(indoc! {r#"
                    Filtering activates only when --context-tag, --filter-tag and
                    --filter-value are all supplied. When --filter-path is omitted, the
                    filter tag is looked up anywhere below the context tag.

                    Values of the `cUF` tag are displayed as UF abbreviations.
                "#})
                .arg(
                    Arg::new("tag")
                        .long("tag")
                        .short('t')
                        .required(true)
                        .help("Name of the tag whose values are extracted (without < >), e.g. `nNF`"),
                )
                .arg(
                    Arg::new("output-format")
                        .long("format")
                        .short('o')
                        .value_parser(["table", "json"])
                        .default_value("table")
                        .help("Sets the output format"),
                )
                .args(filter_args())
                .args(input_args()),
        )
        .subcommand(
            Command::new("consolidate")
                .about("Repackages matching Fatura records from the given files into a new loteNFCom batch document")
                .after_help(indoc! {r#"
                    Two selection modes are supported:

                      --uf SP       keeps records whose UF equals the given state code
                      --tag nNF     runs an extraction first (with the optional filter
                                    arguments) and keeps records whose tag value appears
                                    in the extraction results

                    An empty batch is still emitted as a well-formed document with
                    QUANTIDADE_NFCOM_NO_LOTE="0".
                "#})
                .arg(
                    Arg::new("lote")
                        .long("lote")
                        .required(true)
                        .help("Batch number stamped on the `loteNFCom` root element"),
                )
                .arg(
                    Arg::new("uf")
                        .long("uf")
                        .conflicts_with("tag")
                        .help("Target UF code, case-insensitive, e.g. `SP`"),
                )
                .arg(
                    Arg::new("tag")
                        .long("tag")
                        .short('t')
                        .help("Target tag for result-driven consolidation"),
                )
                .args(filter_args())
                .args(input_args()),
        )
        .get_matches();

    let (name, sub_matches) = matches.subcommand().expect("subcommand is required");

    let mut app = match NfcomxDump::from_cli_matches(sub_matches) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("{e:?}");
            std::process::exit(1);
        }
    };
    app.try_to_initialize_logging();

    let outcome = match name {
        "extract" => app.run_extract(sub_matches),
        "consolidate" => app.run_consolidate(sub_matches),
        _ => unreachable!("subcommands are exhaustive"),
    };

    if let Err(e) = outcome {
        eprintln!("{e:?}");
        std::process::exit(1);
    }
}
