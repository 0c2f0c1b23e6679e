//! Migration orchestrator
//!
//! Order of a run:
//! 1. generate the destination account and write the report header
//! 2. fetch and classify holdings, write the holdings tables
//! 3. initialize the nonce sequencer from the network
//! 4. dispatch every token transfer concurrently and wait for all of them
//! 5. sweep the native balance
//! 6. append the transfer outcomes to the report

use anyhow::{Context, Result};
use ethers::types::Address;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::dispatcher::TransactionDispatcher;
use crate::holdings::{classify, fetch_all, ClassifiedHoldings, HoldingsSource};
use crate::metrics::metrics;
use crate::report::ReportWriter;
use crate::structured_logging::MigrationLogger;
use crate::sweep::NativeSweep;
use crate::tx_builder::TransferContext;
use crate::types::TransferReport;
use crate::wallet::Account;

#[derive(Debug, Clone)]
pub struct MigrationOptions {
    /// Stop after the holdings tables; no transaction is sent
    pub dry_run: bool,
    pub max_in_flight: Option<usize>,
    pub report_dir: PathBuf,
    /// Mirror the report to stdout
    pub echo: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            max_in_flight: None,
            report_dir: PathBuf::from("."),
            echo: true,
        }
    }
}

#[derive(Debug)]
pub struct MigrationSummary {
    pub destination: Address,
    pub holdings: ClassifiedHoldings,
    /// Token transfers in dispatch order, then the native sweep
    pub reports: Vec<TransferReport>,
    pub report_path: PathBuf,
}

impl MigrationSummary {
    pub fn confirmed(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_confirmed()).count()
    }

    pub fn failed(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_failed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.reports.len() - self.confirmed() - self.failed()
    }
}

pub struct Migration {
    ctx: Arc<TransferContext>,
    holdings_source: Arc<dyn HoldingsSource>,
    options: MigrationOptions,
    logger: MigrationLogger,
}

impl Migration {
    pub fn new(
        ctx: Arc<TransferContext>,
        holdings_source: Arc<dyn HoldingsSource>,
        options: MigrationOptions,
    ) -> Self {
        Self {
            ctx,
            holdings_source,
            options,
            logger: MigrationLogger::new(),
        }
    }

    pub fn with_logger(mut self, logger: MigrationLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Run against a freshly generated destination account
    pub async fn run(&self) -> Result<MigrationSummary> {
        self.run_with_destination(Account::generate()).await
    }

    pub async fn run_with_destination(&self, destination: Account) -> Result<MigrationSummary> {
        let source = self.ctx.source().address();
        self.ctx
            .set_destination(destination.address())
            .context("Failed to set destination account")?;
        self.logger
            .log_run_start(&format!("{:?}", source), &format!("{:?}", destination.address()));

        let mut report = ReportWriter::create(&self.options.report_dir, self.options.echo)
            .await
            .context("Failed to create report file")?;
        report
            .write_header(source, &destination)
            .await
            .context("Failed to write report header")?;

        let raw = fetch_all(self.holdings_source.as_ref(), source).await;
        let holdings = classify(&raw);
        info!(
            holdings = holdings.len(),
            collections = holdings.collections.len(),
            rejected = holdings.rejected.len(),
            "Holdings classified"
        );
        report
            .write_holdings(&holdings)
            .await
            .context("Failed to write holdings tables")?;

        let mut summary = MigrationSummary {
            destination: destination.address(),
            holdings,
            reports: Vec::new(),
            report_path: report.path().to_path_buf(),
        };

        if self.options.dry_run {
            info!("Dry run, no transfers sent");
            return Ok(summary);
        }

        let start = self
            .ctx
            .sequencer()
            .initialize()
            .await
            .context("Failed to initialize nonce sequencer")?;
        info!(start_nonce = start, "Nonce sequencer initialized");

        let dispatcher = TransactionDispatcher::new(self.ctx.clone(), self.logger.clone())
            .with_max_in_flight(self.options.max_in_flight);
        summary.reports = dispatcher.dispatch(&summary.holdings).await?;

        let sweep = NativeSweep::new(self.ctx.clone(), self.logger.clone());
        summary.reports.push(sweep.sweep().await?);

        report
            .write_transfers(&summary.reports, summary.destination)
            .await
            .context("Failed to write transfer outcomes")?;

        self.logger
            .log_summary(summary.confirmed(), summary.failed(), summary.skipped());
        debug!(metrics = %metrics().render(), "Run metrics");
        Ok(summary)
    }
}
