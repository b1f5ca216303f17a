//! Category display formatting

use tabled::Tabled;

use super::render;
use crate::models::Category;

#[derive(Tabled)]
struct CategoryRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Rollover")]
    policy: String,
    #[tabled(rename = "Status")]
    status: &'static str,
    #[tabled(rename = "ID")]
    id: String,
}

pub fn format_category_list(categories: &[Category]) -> String {
    if categories.is_empty() {
        return "No categories found.\n".to_string();
    }

    let rows = categories
        .iter()
        .map(|c| CategoryRow {
            name: c.name.clone(),
            policy: c.rollover_policy.to_string(),
            status: if c.archived { "Archived" } else { "Active" },
            id: c.id.to_string(),
        })
        .collect();
    format!("{}\n", render(rows))
}
