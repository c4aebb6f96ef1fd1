//! Basic data reader usage example
//!
//! This example demonstrates:
//! - Connecting to a database
//! - Creating tables and inserting data
//! - Reading rows through a typed cursor
//! - Null, default and enum handling
//! - Custom coercion handlers and cancellation
//!
//! Run with: cargo run --example basic_usage

use rust_data_reader::prelude::*;
use std::sync::Arc;

#[derive(Debug, Default, Clone, Copy, PartialEq)]
enum Tier {
    #[default]
    Free,
    Pro,
    Enterprise,
}

impl DatabaseEnum for Tier {
    fn from_ordinal(ordinal: i64) -> Option<Self> {
        match ordinal {
            0 => Some(Tier::Free),
            1 => Some(Tier::Pro),
            2 => Some(Tier::Enterprise),
            _ => None,
        }
    }
}

rust_data_reader::impl_database_enum!(Tier);

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Rust Data Reader - Basic Usage Example ===\n");

    let db = SqliteDatabase::new();

    println!("1. Connecting to database...");
    db.connect(":memory:").await?;
    println!("   ✓ Connected\n");

    println!("2. Creating table...");
    db.execute(
        "CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL,
            email TEXT,
            age INTEGER,
            balance REAL,
            is_active TEXT,
            tier INTEGER
        )",
        &[],
    )
    .await?;
    println!("   ✓ Table created\n");

    println!("3. Inserting data...");
    let users: Vec<(&str, Option<&str>, i32, f64, &str, i32)> = vec![
        ("  alice ", Some("alice@example.com"), 30, 1500.50, "yes", 1),
        ("bob", None, 25, 2300.75, "N", 0),
        ("charlie", Some("charlie@example.com"), 35, 980.25, "1", 2),
    ];

    for (username, email, age, balance, active, tier) in users {
        let affected = db
            .execute(
                "INSERT INTO users (username, email, age, balance, is_active, tier)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                &[
                    username.into(),
                    email.into(),
                    age.into(),
                    balance.into(),
                    active.into(),
                    tier.into(),
                ],
            )
            .await?;
        println!("   ✓ Inserted {} row(s)", affected);
    }
    println!();

    println!("4. Reading users through the cursor...");
    let mut cursor = db
        .execute_reader("SELECT * FROM users ORDER BY id", &[])
        .await?;
    for column in cursor.schema()? {
        println!("   column {} {} ({})", column.ordinal, column.name, column.data_type);
    }
    while cursor.read_async().await? {
        let id: i64 = cursor.get("id")?;
        let username: String = cursor.get("username")?;
        let email = cursor.get_or("email", "<none>".to_string())?;
        let age: i32 = cursor.get("age")?;
        let balance: f64 = cursor.get("balance")?;
        let active: bool = cursor.get("is_active")?;
        let tier: Tier = cursor.get("tier")?;

        println!(
            "   - User #{}: {} ({}) - Age: {}, Balance: ${:.2}, Active: {}, Tier: {:?}",
            id, username, email, age, balance, active, tier
        );
    }
    cursor.dispose();
    println!();

    println!("5. Missing and null columns...");
    let mut cursor = db
        .execute_reader("SELECT username, email FROM users WHERE username = 'bob'", &[])
        .await?;
    if cursor.read_async().await? {
        println!("   column_exists(\"phone\") = {}", cursor.column_exists("phone")?);
        println!("   get_nullable(\"email\") = {:?}", cursor.get_nullable::<String>("email")?);
        match cursor.get::<String>("phone") {
            Err(e) => println!("   get(\"phone\") failed: {}", e),
            Ok(phone) => println!("   get(\"phone\") = {}", phone),
        }
    }
    println!();

    println!("6. Custom coercion handler...");
    let registry = Arc::new(CoercionRegistry::with_defaults());
    // balances are stored in dollars; read them as whole cents
    registry.register::<i64, _>(|value| match value {
        DatabaseValue::Double(dollars) => DatabaseValue::Long((dollars * 100.0).round() as i64),
        other => other,
    });
    let cents_db = SqliteDatabase::new().with_coercer(Coercer::new(registry));
    cents_db.connect(":memory:").await?;
    let cents: i64 = cents_db.execute_scalar("SELECT 12.34", &[]).await?;
    println!("   $12.34 read as {} cents\n", cents);

    println!("7. Cancellation...");
    let mut cursor = db.execute_reader("SELECT id FROM users", &[]).await?;
    let token = CancellationToken::new();
    token.cancel();
    match cursor.read_async_with(&token).await {
        Err(e) if e.is_canceled() => println!("   ✓ Read canceled: {}", e),
        other => println!("   unexpected: {:?}", other),
    }
    println!();

    println!("8. Final user count...");
    let count: i64 = db.execute_scalar("SELECT COUNT(*) FROM users", &[]).await?;
    println!("   Users: {}\n", count);

    println!("9. Disconnecting...");
    db.disconnect().await?;
    cents_db.disconnect().await?;
    println!("   ✓ Disconnected");

    println!("\n=== Example completed successfully! ===");

    Ok(())
}
