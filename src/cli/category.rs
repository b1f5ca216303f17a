//! Category CLI commands

use clap::Subcommand;

use crate::display::format_category_list;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::Ledger;
use crate::models::{OwnerId, RolloverPolicy};

/// Category subcommands
#[derive(Subcommand)]
pub enum CategoryCommands {
    /// Create a category
    Create {
        /// Category name
        name: String,
        /// Rollover policy (carry-unspent, carry-deficit, carry-both, no-carry)
        #[arg(short, long)]
        policy: Option<String>,
    },
    /// List categories
    List,
    /// Rename a category
    Rename {
        /// Category name or ID
        category: String,
        /// New name
        new_name: String,
    },
    /// Archive a category; it keeps its history but takes no new postings
    Archive {
        /// Category name or ID
        category: String,
    },
}

pub fn handle_category_command(ledger: &Ledger, owner_id: OwnerId, cmd: CategoryCommands) -> LedgerResult<()> {
    match cmd {
        CategoryCommands::Create { name, policy } => {
            let policy = policy
                .map(|p| {
                    RolloverPolicy::parse(&p).ok_or_else(|| {
                        LedgerError::Validation(format!(
                            "Invalid rollover policy: '{}'. Valid policies: carry-unspent, carry-deficit, carry-both, no-carry",
                            p
                        ))
                    })
                })
                .transpose()?;
            let category = ledger.create_category(owner_id, &name, policy)?;
            println!("Created category: {}", category.name);
            println!("  Rollover: {}", category.rollover_policy);
            println!("  ID:       {}", category.id);
        }

        CategoryCommands::List => {
            print!("{}", format_category_list(&ledger.list_categories(owner_id)?));
        }

        CategoryCommands::Rename { category, new_name } => {
            let category = ledger.find_category(owner_id, &category)?;
            let renamed = ledger.rename_category(owner_id, category.id, &new_name)?;
            println!("Renamed category '{}' to '{}'", category.name, renamed.name);
        }

        CategoryCommands::Archive { category } => {
            let category = ledger.find_category(owner_id, &category)?;
            ledger.archive_category(owner_id, category.id)?;
            println!("Archived category: {}", category.name);
        }
    }

    Ok(())
}
