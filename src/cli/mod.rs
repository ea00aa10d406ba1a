//! Command-line parsing for the `odbo` scraper.
//!
//! Parsing lands directly in domain types (`City`, `Timeframe`, `ExportFormat`),
//! so invalid years are rejected before any request is made.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{City, ExportFormat, Timeframe};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "odbo",
    version,
    about = "Scrape Bolivian open data (SIC market prices, cruzero bus lines)"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Export SIC market prices for one city and period to a file.
    Export(ExportArgs),
    /// Fetch every city over every available year and publish one CSV per city to CKAN.
    UploadSic(CatalogArgs),
    /// Fetch all cruzero bus lines and write them as GeoJSON.
    BusLines(BusLinesArgs),
    /// Fetch all cruzero bus lines and publish the GeoJSON to CKAN.
    UploadCruzero(UploadCruzeroArgs),
}

#[derive(Debug, Args, Clone)]
pub struct ExportArgs {
    /// File format to request.
    #[arg(short = 'f', long, value_enum, default_value_t = ExportFormat::Csv)]
    pub format: ExportFormat,

    /// City code.
    #[arg(short = 'l', long, value_enum, default_value_t = City::SantaCruz)]
    pub location: City,

    /// Output file (default: precios_<location>_<when>.<format>).
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// `hoy` for today's prices, or a year (2008 up to last year).
    #[arg(short = 'w', long, default_value = "hoy", value_parser = parse_timeframe)]
    pub when: Timeframe,

    /// Only read the header plus this many data lines.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Write the normalized schema instead of the raw export (CSV only).
    #[arg(long)]
    pub normalize: bool,
}

#[derive(Debug, Args, Clone)]
pub struct CatalogArgs {
    /// Hostname (or URL) of the target CKAN node.
    #[arg(long)]
    pub host: String,

    /// API key for said host (falls back to CKAN_API_KEY).
    #[arg(short = 'k', long)]
    pub key: Option<String>,

    /// Target package (dataset) id where the resource lives.
    #[arg(short = 'p', long)]
    pub package: String,

    /// Target resource name.
    #[arg(short = 'r', long)]
    pub resource: String,
}

#[derive(Debug, Args, Clone)]
pub struct BusLinesArgs {
    /// Output file.
    #[arg(short = 'o', long, default_value = "lineas-de-buses.json")]
    pub output: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct UploadCruzeroArgs {
    #[command(flatten)]
    pub catalog: CatalogArgs,

    /// Filename for the upload.
    #[arg(short = 'n', long, default_value = "lineas-de-buses.json")]
    pub name: String,
}

fn parse_timeframe(s: &str) -> Result<Timeframe, String> {
    s.parse().map_err(|e: crate::error::SourceError| e.to_string())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;
    use crate::domain::Year;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn export_defaults() {
        let cli = Cli::try_parse_from(["odbo", "export"]).unwrap();
        let Command::Export(args) = cli.command else {
            panic!("expected export");
        };
        assert_eq!(args.format, ExportFormat::Csv);
        assert_eq!(args.location, City::SantaCruz);
        assert_eq!(args.when, Timeframe::Today);
        assert!(args.output.is_none());
        assert!(!args.normalize);
    }

    #[test]
    fn export_with_year_and_location() {
        let cli = Cli::try_parse_from([
            "odbo", "export", "-l", "cbba", "-w", "2010", "-f", "xml", "--limit", "5",
        ])
        .unwrap();
        let Command::Export(args) = cli.command else {
            panic!("expected export");
        };
        assert_eq!(args.location, City::Cochabamba);
        assert_eq!(args.when, Timeframe::Year(Year::new(2010).unwrap()));
        assert_eq!(args.format, ExportFormat::Xml);
        assert_eq!(args.limit, Some(5));
    }

    #[test]
    fn out_of_range_year_is_rejected_at_parse_time() {
        assert!(Cli::try_parse_from(["odbo", "export", "-w", "2001"]).is_err());
        assert!(Cli::try_parse_from(["odbo", "export", "-l", "lpz"]).is_err());
    }

    #[test]
    fn upload_cruzero_flattens_catalog_args() {
        let cli = Cli::try_parse_from([
            "odbo",
            "upload-cruzero",
            "--host",
            "datos.example.bo",
            "-p",
            "transporte",
            "-r",
            "Lineas",
        ])
        .unwrap();
        let Command::UploadCruzero(args) = cli.command else {
            panic!("expected upload-cruzero");
        };
        assert_eq!(args.catalog.package, "transporte");
        assert_eq!(args.name, "lineas-de-buses.json");
        assert!(args.catalog.key.is_none());
    }
}
