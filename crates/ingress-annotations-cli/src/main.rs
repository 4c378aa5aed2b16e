use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{Args, Parser, Subcommand};
use ingress_annotations::{
    docs,
    extractor::{Extracted, Extractor, IngressAnnotations},
    k8s_openapi::api::networking::v1::Ingress,
    resolver::{DEFAULT_ANNOTATIONS_RISK_LEVEL, SecurityConfiguration, StaticResolver},
};
use serde::Serialize;
use snafu::{Report, ResultExt, Snafu, ensure};

mod logging;

const LOG_ENV: &str = "INGRESS_ANNOTATIONS_LOG";

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to read manifest from {path}", path = path.display()))]
    ReadManifest {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to deserialize Ingress from {path}", path = path.display()))]
    DeserializeIngress {
        source: serde_yaml::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to serialize check report"))]
    SerializeReport { source: serde_yaml::Error },

    #[snafu(display("failed to write output"))]
    WriteOutput { source: std::io::Error },

    #[snafu(display("failed to write documentation to {path}", path = path.display()))]
    WriteDocs {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("{failed} feature(s) of Ingress {name:?} cannot be configured"))]
    FeaturesFailed { failed: usize, name: String },
}

#[derive(Debug, Parser)]
#[command(
    name = "ingress-annotations",
    author,
    version,
    about = "Checks Ingress annotations and renders their documentation"
)]
struct Opts {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parses and risk checks the annotations of an Ingress manifest.
    Check(CheckArguments),

    /// Renders the documentation of all supported annotations as Markdown.
    Docs(DocsArguments),
}

#[derive(Debug, Args)]
struct CheckArguments {
    /// Path to a YAML manifest containing a single Ingress.
    #[arg(long, short)]
    file: PathBuf,

    /// The highest accepted annotation risk level: Low, Medium, High or Critical.
    #[arg(long, env, default_value = DEFAULT_ANNOTATIONS_RISK_LEVEL)]
    annotations_risk_level: String,
}

#[derive(Debug, Args)]
struct DocsArguments {
    /// Write the documentation to this file instead of stdout.
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    annotations: IngressAnnotations,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    errors: BTreeMap<&'static str, String>,
}

#[snafu::report]
fn main() -> Result<(), Error> {
    logging::initialize_logging(LOG_ENV);

    let opts = Opts::parse();
    let mut stdout = std::io::stdout().lock();

    match opts.command {
        Command::Check(arguments) => check(&arguments, &mut stdout),
        Command::Docs(arguments) => write_docs(&arguments, &mut stdout),
    }
}

fn check(arguments: &CheckArguments, out: &mut impl Write) -> Result<(), Error> {
    let ingress = read_ingress(&arguments.file)?;
    let resolver = StaticResolver::from(SecurityConfiguration {
        annotations_risk_level: arguments.annotations_risk_level.clone(),
    });

    tracing::debug!(
        file = %arguments.file.display(),
        risk_level = %arguments.annotations_risk_level,
        "checking Ingress annotations"
    );

    let Extracted {
        annotations,
        errors,
    } = Extractor::new(Arc::new(resolver)).extract(&ingress);
    let failed = errors.len();

    let report = CheckReport {
        annotations,
        errors: errors
            .into_iter()
            .map(|(feature, err)| (feature, Report::from_error(err).to_string()))
            .collect(),
    };

    let output = serde_yaml::to_string(&report).context(SerializeReportSnafu)?;
    out.write_all(output.as_bytes()).context(WriteOutputSnafu)?;

    ensure!(
        failed == 0,
        FeaturesFailedSnafu {
            failed,
            name: ingress.metadata.name.unwrap_or_default(),
        }
    );

    Ok(())
}

fn read_ingress(path: &Path) -> Result<Ingress, Error> {
    let manifest = fs::read_to_string(path).context(ReadManifestSnafu { path })?;
    serde_yaml::from_str(&manifest).context(DeserializeIngressSnafu { path })
}

fn write_docs(arguments: &DocsArguments, out: &mut impl Write) -> Result<(), Error> {
    let extractor = Extractor::new(Arc::new(StaticResolver::default()));
    let table = docs::render_markdown(extractor.groups().iter().map(|(_, group)| *group));

    match &arguments.output {
        Some(path) => {
            fs::write(path, table).context(WriteDocsSnafu { path })?;
            tracing::info!(path = %path.display(), "wrote annotation documentation");
            Ok(())
        }
        None => out.write_all(table.as_bytes()).context(WriteOutputSnafu),
    }
}
