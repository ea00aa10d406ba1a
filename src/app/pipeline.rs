//! Shared workflows used by the CLI subcommands.
//!
//! Each workflow is fetch -> normalize/aggregate -> write or publish. The
//! catalog-facing steps take trait objects so they can run against fakes.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::catalog::{Catalog, PublishOutcome, Upload, publish};
use crate::cli::ExportArgs;
use crate::config::Settings;
use crate::data::{CruzeroClient, PriceSource, SicClient};
use crate::domain::{BusLine, City, ExportFormat, Year};
use crate::error::AppError;
use crate::io::export::{
    default_output_path, normalized_csv_bytes, write_normalized_file, write_raw,
};
use crate::io::geojson::bus_lines_geojson_bytes;
use crate::io::ingest::read_raw_table;
use crate::prices::aggregate::aggregate;
use crate::prices::normalize::normalize_table;

/// What `export` wrote.
#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub path: PathBuf,
    /// Data rows written (normalized) or lines past the header (raw CSV).
    /// Raw XML bodies carry no row count.
    pub rows: Option<usize>,
    pub duplicates_dropped: usize,
}

/// Fetch one SIC export and write it to disk, raw or normalized.
pub fn run_export(settings: &Settings, args: &ExportArgs) -> Result<ExportSummary, AppError> {
    if args.normalize && args.format != ExportFormat::Csv {
        return Err(AppError::new(2, "`--normalize` requires `--format csv`."));
    }

    let client = SicClient::new(settings)?;
    let path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(args.location, args.when, args.format));

    info!(
        city = %args.location,
        when = %args.when,
        url = %client.url(args.location, args.when),
        "requesting data"
    );
    let body = client.fetch_export(args.location, args.when, args.format, args.limit)?;

    let summary = if args.normalize {
        let raw = read_raw_table(&body)?;
        let table = normalize_table(&raw)?;
        write_normalized_file(&path, &table.records)?;
        ExportSummary {
            path,
            rows: Some(table.records.len()),
            duplicates_dropped: table.dedup.dropped,
        }
    } else {
        write_raw(&path, &body)?;
        ExportSummary {
            path,
            rows: raw_row_count(args.format, &body),
            duplicates_dropped: 0,
        }
    };

    info!(path = %summary.path.display(), rows = ?summary.rows, "output written");
    Ok(summary)
}

fn raw_row_count(format: ExportFormat, body: &str) -> Option<usize> {
    match format {
        ExportFormat::Csv => Some(body.lines().count().saturating_sub(1)),
        ExportFormat::Xml => None,
    }
}

/// What `publish_city_prices` did for one city.
#[derive(Debug, Clone)]
pub struct CityReport {
    pub city: City,
    /// `None` when no year had data and nothing was uploaded.
    pub outcome: Option<PublishOutcome>,
    pub rows: usize,
    pub years_covered: Vec<Year>,
    pub years_skipped: Vec<Year>,
    pub duplicates_dropped: usize,
}

/// Aggregate one city across `years` and publish it as `"{resource} {CITY}"`.
pub fn publish_city_prices<S, C>(
    source: &S,
    catalog: &C,
    city: City,
    years: &[Year],
    package: &str,
    resource: &str,
) -> Result<CityReport, AppError>
where
    S: PriceSource + ?Sized,
    C: Catalog + ?Sized,
{
    let agg = aggregate(source, &[city], years)?;
    let mut report = CityReport {
        city,
        outcome: None,
        rows: agg.records.len(),
        years_covered: agg.covered.iter().map(|c| c.year).collect(),
        years_skipped: agg.skipped.iter().map(|&(_, year)| year).collect(),
        duplicates_dropped: agg.duplicates_dropped,
    };
    for cov in &agg.covered {
        info!(city = %city, year = %cov.year, rows = cov.rows, "year covered");
    }
    if !report.years_skipped.is_empty() {
        let skipped: Vec<String> = report.years_skipped.iter().map(Year::to_string).collect();
        warn!(city = %city, years = %skipped.join(","), "years without data");
    }

    if agg.is_empty() {
        warn!(city = %city, "no data for any year; skipping upload");
        return Ok(report);
    }

    let bytes = normalized_csv_bytes(&agg.records)?;
    info!(
        city = %city,
        rows = agg.records.len(),
        duplicates_dropped = agg.duplicates_dropped,
        data_size = bytes.len(),
        "data ready"
    );

    let name = format!("{resource} {}", city.name());
    let filename = format!("sic_{}.csv", city.name());
    let upload = Upload {
        name: &name,
        format: "csv",
        filename: &filename,
        bytes: &bytes,
    };
    report.outcome = Some(publish(catalog, package, &upload)?);
    info!(city = %city, name = %name, "saved");
    Ok(report)
}

/// Publish every city in turn; the first failure stops the run.
pub fn run_upload_sic<C: Catalog + ?Sized>(
    settings: &Settings,
    catalog: &C,
    package: &str,
    resource: &str,
) -> Result<Vec<CityReport>, AppError> {
    let source = SicClient::new(settings)?;
    let years: Vec<Year> = Year::all_valid().collect();

    City::ALL
        .into_iter()
        .map(|city| publish_city_prices(&source, catalog, city, &years, package, resource))
        .collect()
}

pub fn fetch_bus_lines(settings: &Settings) -> Result<Vec<BusLine>, AppError> {
    let client = CruzeroClient::new(settings)?;
    let lines = client.all_bus_lines()?;
    info!(count = lines.len(), "bus lines fetched");
    Ok(lines)
}

pub fn bus_lines_payload(lines: &[BusLine]) -> Result<Vec<u8>, AppError> {
    bus_lines_geojson_bytes(lines)
        .map_err(|e| AppError::new(4, format!("Failed to encode GeoJSON: {e}")))
}

/// Publish bus lines as a single GeoJSON resource.
pub fn publish_bus_lines<C: Catalog + ?Sized>(
    catalog: &C,
    lines: &[BusLine],
    package: &str,
    resource: &str,
    filename: &str,
) -> Result<PublishOutcome, AppError> {
    let bytes = bus_lines_payload(lines)?;
    let upload = Upload {
        name: resource,
        format: "geojson",
        filename,
        bytes: &bytes,
    };
    Ok(publish(catalog, package, &upload)?)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use chrono::NaiveDate;

    use super::*;
    use crate::catalog::Resource;
    use crate::domain::{CompositeKey, DedupReport, NormalizedRecord, NormalizedTable, Timeframe};
    use crate::error::{CatalogError, SourceError};

    struct OneYearSource;

    impl PriceSource for OneYearSource {
        fn fetch_table(
            &self,
            city: City,
            timeframe: Timeframe,
        ) -> Result<NormalizedTable, SourceError> {
            match (city, timeframe) {
                (City::SantaCruz, Timeframe::Year(y)) if y.value() == 2010 => Ok(NormalizedTable {
                    records: vec![NormalizedRecord {
                        key: CompositeKey {
                            fecha: NaiveDate::from_ymd_opt(2010, 1, 4).unwrap(),
                            producto: "Papa".to_string(),
                            variedad: "Holandesa".to_string(),
                        },
                        procedencia: None,
                        observaciones: None,
                        mayorista: None,
                        minorista: None,
                    }],
                    dedup: DedupReport::default(),
                }),
                _ => Err(SourceError::DataUnavailable {
                    query: format!("{city}/{}", timeframe.url_part()),
                    reason: "HTTP 404".to_string(),
                }),
            }
        }
    }

    #[derive(Default)]
    struct RecordingCatalog {
        uploads: RefCell<Vec<(String, String, String, Vec<u8>)>>,
    }

    impl Catalog for RecordingCatalog {
        fn package_resources(&self, _package_id: &str) -> Result<Vec<Resource>, CatalogError> {
            Ok(Vec::new())
        }

        fn create_resource(
            &self,
            _package_id: &str,
            upload: &Upload<'_>,
        ) -> Result<Resource, CatalogError> {
            self.uploads.borrow_mut().push((
                upload.name.to_string(),
                upload.format.to_string(),
                upload.filename.to_string(),
                upload.bytes.to_vec(),
            ));
            Ok(Resource {
                id: "new".to_string(),
                name: Some(upload.name.to_string()),
                url: None,
            })
        }

        fn update_resource(
            &self,
            _resource_id: &str,
            _upload: &Upload<'_>,
        ) -> Result<Resource, CatalogError> {
            Err(CatalogError::Api("unexpected update".to_string()))
        }
    }

    fn years() -> Vec<Year> {
        [2009, 2010, 2011].into_iter().map(|y| Year::new(y).unwrap()).collect()
    }

    fn publish_for(catalog: &RecordingCatalog, city: City) -> CityReport {
        publish_city_prices(&OneYearSource, catalog, city, &years(), "sic", "Precios").unwrap()
    }

    #[test]
    fn publishes_city_with_data() {
        let catalog = RecordingCatalog::default();
        let report = publish_for(&catalog, City::SantaCruz);
        assert!(matches!(report.outcome, Some(PublishOutcome::Created(_))));
        assert_eq!(report.rows, 1);
        assert_eq!(report.years_covered, vec![Year::new(2010).unwrap()]);
        assert_eq!(
            report.years_skipped,
            vec![Year::new(2009).unwrap(), Year::new(2011).unwrap()]
        );
        assert_eq!(report.duplicates_dropped, 0);

        let uploads = catalog.uploads.borrow();
        assert_eq!(uploads.len(), 1);
        let (name, format, filename, bytes) = &uploads[0];
        assert_eq!(name, "Precios SANTA_CRUZ");
        assert_eq!(format, "csv");
        assert_eq!(filename, "sic_SANTA_CRUZ.csv");
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("2010-01-04,Papa,Holandesa"));
    }

    #[test]
    fn city_without_data_is_skipped() {
        let catalog = RecordingCatalog::default();
        let report = publish_for(&catalog, City::Trinidad);
        assert!(report.outcome.is_none());
        assert_eq!(report.rows, 0);
        assert!(report.years_covered.is_empty());
        assert_eq!(report.years_skipped.len(), 3);
        assert!(catalog.uploads.borrow().is_empty());
    }

    #[test]
    fn bus_lines_publish_as_geojson() {
        let catalog = RecordingCatalog::default();
        publish_bus_lines(&catalog, &[], "transporte", "Lineas", "lineas-de-buses.json")
            .unwrap();
        let uploads = catalog.uploads.borrow();
        assert_eq!(uploads[0].1, "geojson");
        assert_eq!(uploads[0].2, "lineas-de-buses.json");
    }

    #[test]
    fn raw_row_count_only_for_csv() {
        let csv = "fecha,producto\n01/01/2010,Papa\n02/01/2010,Yuca\n";
        assert_eq!(raw_row_count(ExportFormat::Csv, csv), Some(2));
        assert_eq!(raw_row_count(ExportFormat::Csv, ""), Some(0));

        let xml = "<?xml version=\"1.0\"?>\n<rows>\n<row/>\n</rows>\n";
        assert_eq!(raw_row_count(ExportFormat::Xml, xml), None);
    }
}
