use std::path::Path;
use std::process::ExitCode;

use schemata_core::types::{TypeFilter, TypeSummary};
use tabled::{Table, Tabled, settings::Style};

use super::Session;
use crate::TypesArgs;

#[derive(Tabled)]
struct TypeRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Props")]
    properties: usize,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Tags")]
    tags: String,
}

impl From<&TypeSummary> for TypeRow {
    fn from(summary: &TypeSummary) -> Self {
        let mut version = summary.version.clone();
        if summary.metadata.deprecated {
            version.push_str(" (deprecated)");
        }
        Self {
            id: summary.id.clone(),
            name: summary.name.clone(),
            version,
            properties: summary.property_count,
            category: summary.metadata.category.clone().unwrap_or_default(),
            tags: summary.metadata.tags.join(", "),
        }
    }
}

pub async fn run(
    config: Option<&Path>,
    root: Option<&Path>,
    args: TypesArgs,
) -> color_eyre::Result<ExitCode> {
    let session = Session::open(config, root).await?;

    let mut filter = if args.all { TypeFilter::all() } else { TypeFilter::all().active_only() };
    if let Some(category) = args.category {
        filter = filter.in_category(category);
    }
    if let Some(tag) = args.tag {
        filter = filter.tagged(tag);
    }

    let summaries = session.registry.get_all_metadata(&filter);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(ExitCode::SUCCESS);
    }

    if summaries.is_empty() {
        println!("(no note types registered)");
        return Ok(ExitCode::SUCCESS);
    }

    let rows: Vec<TypeRow> = summaries.iter().map(TypeRow::from).collect();
    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
    Ok(ExitCode::SUCCESS)
}
