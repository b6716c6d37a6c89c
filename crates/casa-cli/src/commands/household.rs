//! Household command implementations

use anyhow::{Context, Result};
use casa_core::db::Database;
use casa_core::models::Household;

use super::household_member;

fn print_household(household: &Household) {
    println!("   Household: {} (#{})", household.name, household.id);
    println!("   Invite code: {}", household.invite_code);
    println!(
        "   Members: {}{}",
        household.member_count,
        if household.has_vacancy() { "" } else { " (full)" }
    );
}

pub fn cmd_household_create(
    db: &Database,
    name: &str,
    email: &str,
    display_name: &str,
) -> Result<()> {
    let member = db
        .register_member(&email.trim().to_lowercase(), display_name, None)
        .context("Failed to register member")?;
    let household = db
        .create_household(member.id, name)
        .context("Failed to create household")?;

    println!("✅ Created household for {}", member.display_name);
    print_household(&household);
    println!();
    println!("   Share the invite code so a partner can join:");
    println!(
        "   casa household join --code {} --email partner@example.com",
        household.invite_code
    );

    Ok(())
}

pub fn cmd_household_join(
    db: &Database,
    code: &str,
    email: &str,
    display_name: &str,
) -> Result<()> {
    let member = db
        .register_member(&email.trim().to_lowercase(), display_name, None)
        .context("Failed to register member")?;
    let household = db
        .join_household(member.id, code)
        .context("Failed to join household")?;

    println!("✅ {} joined the household", member.display_name);
    print_household(&household);

    Ok(())
}

pub fn cmd_household_show(db: &Database, email: &str) -> Result<()> {
    let (_, household_id) = household_member(db, email)?;
    let household = db
        .get_household(household_id)?
        .context("Household not found")?;

    println!();
    println!("🏠 {}", household.name);
    println!("   ─────────────────────────────");
    print_household(&household);
    for member in db.list_household_members(household_id)? {
        println!("   • {} <{}>", member.display_name, member.email);
    }

    Ok(())
}
