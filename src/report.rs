//! Migration report artifact
//!
//! A plain-text file `output_<timestamp>.txt` with the run details, the new
//! wallet credentials, the holdings tables and the transfer outcomes. Every
//! section is mirrored to stdout.

use chrono::Local;
use ethers::types::Address;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::holdings::ClassifiedHoldings;
use crate::types::{AssetClass, Holding, TransferOutcome, TransferReport};
use crate::wallet::Account;

pub const SECTION_WIDTH: usize = 80;

/// `word` centred in a line of `=` of `width` columns
pub fn pretty_print_section(word: &str, width: usize) -> String {
    let len = word.chars().count();
    let left = width.saturating_sub(len) / 2;
    let right = width.saturating_sub(left + len);
    format!("{}{}{}", "=".repeat(left), word, "=".repeat(right))
}

/// Raw integer quantity scaled by `decimals`, two decimal places
pub fn format_quantity(quantity: &str, decimals: u8) -> String {
    match quantity.trim().parse::<f64>() {
        Ok(raw) => format!("{:.2}", raw / 10f64.powi(i32::from(decimals))),
        Err(_) => quantity.to_string(),
    }
}

/// Left-aligned table under a section banner. Each column is one wider than
/// its widest cell; the banner and rule span the summed cell widths.
pub fn render_table(title: &str, headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    let total: usize = widths.iter().sum();

    let mut out = String::new();
    out.push_str(&pretty_print_section(title, total));
    out.push('\n');
    out.push_str(&format_row(headers.iter().copied(), &widths));
    out.push('\n');
    out.push_str(&"-".repeat(total));
    out.push('\n');
    for row in rows {
        out.push_str(&format_row(row.iter().map(String::as_str), &widths));
        out.push('\n');
    }
    out
}

fn format_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, width)| format!("{:<w$}", cell, w = width + 1))
        .collect()
}

fn holdings_rows(holdings: &ClassifiedHoldings, class: AssetClass) -> Vec<Vec<String>> {
    match class {
        AssetClass::Fungible => holdings
            .of_class(class)
            .iter()
            .filter_map(|h| match h {
                Holding::Fungible(f) => Some(vec![
                    f.symbol.clone(),
                    f.name.clone(),
                    format_quantity(&f.quantity, f.decimals),
                    format!("{:?}", f.contract),
                ]),
                _ => None,
            })
            .collect(),
        AssetClass::NonFungible => holdings
            .collections
            .iter()
            .map(|t| {
                vec![
                    t.symbol.clone(),
                    t.name.clone(),
                    t.count.to_string(),
                    format!("{:?}", t.contract),
                ]
            })
            .collect(),
        AssetClass::MultiToken => holdings
            .of_class(class)
            .iter()
            .filter_map(|h| match h {
                Holding::MultiToken(m) => Some(vec![
                    m.balance.clone(),
                    m.token_id.clone(),
                    format!("{:?}", m.contract),
                ]),
                _ => None,
            })
            .collect(),
    }
}

fn holdings_headers(class: AssetClass) -> &'static [&'static str] {
    match class {
        AssetClass::Fungible => &["tokenSymbol", "tokenName", "tokenQuantity", "tokenAddress"],
        AssetClass::NonFungible => &["collectionSymbol", "collectionName", "count", "tokenAddress"],
        AssetClass::MultiToken => &["balance", "tokenId", "tokenAddress"],
    }
}

/// One line per transfer outcome
pub fn describe_outcome(report: &TransferReport, destination: Address) -> String {
    let asset = report.describe();
    match &report.outcome {
        TransferOutcome::Confirmed(receipt) => format!(
            "Sent {} to {:?} (nonce {}, tx {:?})",
            asset, destination, receipt.nonce, receipt.tx_hash
        ),
        TransferOutcome::Failed { reason, nonce, .. } => match nonce {
            Some(n) => format!("Failed to send {} (nonce {}): {}", asset, n, reason),
            None => format!("Failed to send {}: {}", asset, reason),
        },
        TransferOutcome::Skipped(reason) => format!("Skipped {}: {}", asset, reason),
    }
}

pub struct ReportWriter {
    path: PathBuf,
    file: File,
    echo: bool,
}

impl ReportWriter {
    /// Create `output_<YYYYmmdd_HHMMSS>.txt` in `dir`
    pub async fn create(dir: &Path, echo: bool) -> io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let name = format!("output_{}.txt", Local::now().format("%Y%m%d_%H%M%S"));
        Self::create_at(dir.join(name), echo).await
    }

    pub async fn create_at(path: PathBuf, echo: bool) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .await?;
        info!(path = %path.display(), "Report file created");
        Ok(Self { path, file, echo })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn emit(&mut self, text: &str) -> io::Result<()> {
        self.file.write_all(text.as_bytes()).await?;
        self.file.flush().await?;
        if self.echo {
            print!("{}", text);
        }
        Ok(())
    }

    /// DETAILS and NEW WALLET sections. This is the only place the
    /// destination secret is written.
    pub async fn write_header(&mut self, source: Address, destination: &Account) -> io::Result<()> {
        let secret = destination.secret_hex();
        let text = format!(
            "{}\nFROM: {:?}\nTO: {:?}\n\n{}\nADDRESS: {:?}\nPRIVATE KEY: {}\n",
            pretty_print_section("DETAILS", SECTION_WIDTH),
            source,
            destination.address(),
            pretty_print_section("NEW WALLET", SECTION_WIDTH),
            destination.address(),
            secret.as_str(),
        );
        self.emit(&text).await
    }

    /// One table per asset class
    pub async fn write_holdings(&mut self, holdings: &ClassifiedHoldings) -> io::Result<()> {
        for class in AssetClass::ALL {
            let rows = holdings_rows(holdings, class);
            let title = format!("{} HOLDINGS", class);
            let table = render_table(&title, holdings_headers(class), &rows);
            self.emit(&format!("\n\n{}", table)).await?;
        }
        if !holdings.rejected.is_empty() {
            let mut text = format!("\n{} malformed record(s) ignored:\n", holdings.rejected.len());
            for e in &holdings.rejected {
                text.push_str(&format!("  {}\n", e));
            }
            self.emit(&text).await?;
        }
        Ok(())
    }

    pub async fn write_transfers(
        &mut self,
        reports: &[TransferReport],
        destination: Address,
    ) -> io::Result<()> {
        let mut text = format!("\n\n{}\n", pretty_print_section("TRANSFERS", SECTION_WIDTH));
        for report in reports {
            text.push_str(&describe_outcome(report, destination));
            text.push('\n');
        }

        let confirmed = reports.iter().filter(|r| r.outcome.is_confirmed()).count();
        let failed = reports.iter().filter(|r| r.outcome.is_failed()).count();
        let skipped = reports.len() - confirmed - failed;
        text.push_str(&format!(
            "\nconfirmed: {}, failed: {}, skipped: {}\n",
            confirmed, failed, skipped
        ));
        self.emit(&text).await
    }
}
