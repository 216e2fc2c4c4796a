//! Handlers for the `sets` command group.

use serde_json::json;
use tabled::{Table, Tabled};

use super::command::SetsCommand;
use super::output;
use crate::domain::{CompareCompany, ComparisonSet, ComparisonSetSummary};
use crate::error::Result;
use crate::infrastructure::bootstrap::Services;

#[derive(Tabled)]
struct SetRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Companies")]
    members: usize,
}

#[derive(Tabled)]
struct MemberRow {
    #[tabled(rename = "Code")]
    code: String,
    #[tabled(rename = "Company")]
    name: String,
    #[tabled(rename = "PER")]
    per: String,
    #[tabled(rename = "PBR")]
    pbr: String,
    #[tabled(rename = "ROE %")]
    roe: String,
}

fn ratio(value: Option<rust_decimal::Decimal>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.round_dp(2).to_string())
}

impl From<&CompareCompany> for MemberRow {
    fn from(company: &CompareCompany) -> Self {
        Self {
            code: company.stock_code.to_string(),
            name: company.name.clone(),
            per: ratio(company.ratios.per),
            pbr: ratio(company.ratios.pbr),
            roe: ratio(company.ratios.roe),
        }
    }
}

/// Execute a `sets` subcommand.
pub async fn execute(command: SetsCommand, services: &Services) -> Result<()> {
    match command {
        SetsCommand::List => {
            let sets = services.queries.sets().await.into_result()?;
            print_list(&sets);
        }
        SetsCommand::Show { id } => {
            let set = services.queries.set_detail(Some(&id)).await.into_result()?;
            print_detail(&set);
        }
        SetsCommand::Create { name } => {
            let id = services.mutations.create_set(&name).await?;
            if output::is_json() {
                output::json_record("set_created", json!({ "id": id, "name": name.trim() }));
            } else {
                output::success(&format!("Created set {}", output::highlight(&id)));
            }
        }
        SetsCommand::Rename { id, name } => {
            let name = services.mutations.rename_set(&id, &name).await?;
            output::success(&format!("Renamed set {id} to {name}"));
        }
        SetsCommand::Add { id, stock_code } => {
            services.mutations.add_member(&id, &stock_code).await?;
            output::success(&format!("Added {stock_code} to set {id}"));
        }
        SetsCommand::Remove { id, stock_code } => {
            services.mutations.remove_member(&id, &stock_code).await?;
            output::success(&format!("Removed {stock_code} from set {id}"));
        }
        SetsCommand::Delete { id } => {
            services.mutations.delete_set(&id).await?;
            output::success(&format!("Deleted set {id}"));
        }
    }
    Ok(())
}

fn print_list(sets: &[ComparisonSetSummary]) {
    if output::is_json() {
        output::json_record("sets", json!({ "sets": sets }));
        return;
    }

    output::section("Comparison sets");
    if sets.is_empty() {
        output::note("(none)");
        output::hint(&format!(
            "run {} to create one",
            output::highlight("comparesync sets create <name>")
        ));
        return;
    }

    let rows: Vec<SetRow> = sets
        .iter()
        .map(|s| SetRow {
            id: s.id.to_string(),
            name: s.name.clone(),
            members: s.member_count,
        })
        .collect();
    output::lines(&Table::new(rows).to_string());
}

fn print_detail(set: &ComparisonSet) {
    if output::is_json() {
        output::json_record("set", json!(set));
        return;
    }

    output::section(&set.name);
    output::field("ID", &set.id);
    output::field("Companies", set.len());
    if set.is_empty() {
        output::note("(no companies yet)");
        return;
    }
    let rows: Vec<MemberRow> = set.members.iter().map(MemberRow::from).collect();
    output::lines(&Table::new(rows).to_string());
}
