//! Plain-text renderings of command results.

use std::fmt;

use chain_dash::amount::{format_amount, format_face};
use chain_dash::summary::Remainder;
use chain_dash::FinalizedTransaction;
use wallet_core::{AppraisalReport, BalanceReport, CoinListing};

pub struct Appraisal<'a>(pub &'a AppraisalReport);

impl fmt::Display for Appraisal<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        let fees = &report.fees;
        writeln!(f, "Min:    {} ({} acceptance)", format_amount(fees.min), report.chance)?;
        writeln!(f, "Mid:    {} (75% acceptance)", format_amount(fees.mid))?;
        writeln!(f, "Max:    {} (100% acceptance)", format_amount(fees.max))?;
        writeln!(f)?;
        writeln!(f, "Range:  {}", format_amount(report.range()))
    }
}

pub struct Balances<'a>(pub &'a BalanceReport);

impl fmt::Display for Balances<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Wallets:")?;
        for account in &self.0.accounts {
            writeln!(
                f,
                "    {}: {} ({} coins)",
                account.handle,
                format_amount(account.satoshis),
                account.coins
            )?;
        }
        writeln!(f)?;
        writeln!(f, "Total: {}", format_amount(self.0.total))
    }
}

pub struct Coins<'a> {
    pub listing: &'a CoinListing,
    pub stamp_size: u64,
}

impl fmt::Display for Coins<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listing = self.listing;
        writeln!(f, "    {:>16}  {:<21} Wallet", "Denom Stamp", "Coin (Addr:Tx:Out)")?;
        for (line, owner) in listing.rows() {
            let stamp = match line.remainder {
                Remainder::Stamps(n) => format!("s*{n}"),
                Remainder::Dirt(d) => format!("{d:05}"),
            };
            let reused = if line.reused { '*' } else { ' ' };
            writeln!(
                f,
                "    {:>10} {:>5}  {:<20}{reused} {owner}",
                format_face(line.face_value),
                stamp,
                line.coin.short_id(),
            )?;
        }

        let t = &listing.summary.totals;
        writeln!(f, "--------------------------------------------------")?;
        writeln!(f, "     {} coins", t.coins)?;
        writeln!(
            f,
            "     {} s*{} (s*{}/c + s*{} + {}) [total]",
            format_face(t.face_value),
            t.stamps,
            t.stamps_each,
            t.extra_stamps,
            t.dirt
        )?;
        match &listing.summary.projection {
            Some(p) => writeln!(
                f,
                "     {} s*{} (s*{}/c + s*{} + {}) [denominated]",
                format_face(p.face_value),
                p.num_stamps,
                p.stamps_each,
                p.extra_stamps,
                p.extra_dirt
            ),
            None if t.coins > 0 => writeln!(
                f,
                "     too little value to re-denominate at {} sat per stamp",
                self.stamp_size
            ),
            None => Ok(()),
        }
    }
}

pub struct Transaction<'a>(pub &'a FinalizedTransaction);

impl fmt::Display for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tx = self.0;
        let stamp = tx.stamp_size;

        writeln!(f, "Inputs:")?;
        for coin in &tx.inputs {
            writeln!(f, "   {}  {:>10}", coin.short_id(), coin.satoshis)?;
        }
        writeln!(
            f,
            " Total In: {} | {:>10} | {} coins",
            format_amount(tx.total_in()),
            tx.total_in(),
            tx.inputs.len()
        )?;
        writeln!(f)?;

        writeln!(f, "Outputs:")?;
        let mut stamps_out = 0;
        for out in &tx.outputs {
            stamps_out += out.stamps;
            let addr: String = out.address.chars().take(9).collect();
            let change = if out.change { " [change]" } else { "" };
            writeln!(
                f,
                "   {addr}: {:>9} | {:>10} ({} * {stamp}){change}",
                format_face(out.face_value),
                out.satoshis,
                out.stamps,
            )?;
        }
        writeln!(
            f,
            "Total Out: {} | {:>10} | s*{stamps_out} | {} coins",
            format_amount(tx.total_out()),
            tx.total_out(),
            tx.outputs.len()
        )?;
        writeln!(
            f,
            "Fee:       {} | {} - {} = ({} + {})",
            tx.fee,
            tx.total_in(),
            tx.total_out(),
            tx.fee_estimate.max,
            tx.fee_dust()
        )
    }
}
