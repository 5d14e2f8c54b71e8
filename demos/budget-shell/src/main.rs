use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tally::prelude::*;

// ---------------------------------------------------------------------------
// Demo data
// ---------------------------------------------------------------------------

/// A dev server with two households' worth of data.
fn seeded_api() -> Arc<DevApi> {
    let api = DevApi::new();
    api.set_latency(Duration::from_millis(40));

    let ana = api.add_user("ana@example.com", "correct-horse", "Ana", "Souza");
    api.put_resource(
        ana.id,
        Resource::Transactions.path(),
        json!([
            {"date": "2024-03-01", "description": "Rent", "amount": "-1800.00", "category": "Housing"},
            {"date": "2024-03-02", "description": "Salary", "amount": "6500.00", "category": "Income"},
            {"date": "2024-03-04", "description": "Market", "amount": "-312.40", "category": "Groceries"},
        ]),
    );
    api.put_resource(
        ana.id,
        Resource::Dashboard.path(),
        json!({"balance": "4387.60", "month_income": "6500.00", "month_expenses": "2112.40"}),
    );

    let bo = api.add_user("bo@example.com", "battery-staple", "Bo", "Lima");
    api.put_resource(
        bo.id,
        Resource::Transactions.path(),
        json!([{"date": "2024-03-03", "description": "Bus pass", "amount": "-96.00", "category": "Transport"}]),
    );

    Arc::new(api)
}

fn describe(outcome: &Outcome<Page>) -> String {
    match outcome {
        Outcome::Render(r) if r.layout => format!("{:?} (in layout) at {}", r.view, r.path),
        Outcome::Render(r) => format!("{:?} at {}", r.view, r.path),
        Outcome::Loading { path } => format!("loading {path}"),
    }
}

// ---------------------------------------------------------------------------
// Walkthrough
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tally::logging::init("budget_shell=info,tally_session=info,tally_query=debug,warn");

    let api = seeded_api();
    let app = AppContext::with_defaults(api.clone());

    let mut auth = app.auth();
    let watcher = tokio::spawn(async move {
        while let Some(session) = auth.changed().await {
            let who = session.principal().map(|p| p.display_name()).unwrap_or_default();
            tracing::info!(status = %session.status(), who = %who, "session changed");
        }
    });

    let outcome = app.start("/transactions").await?;
    eprintln!("start      → {}", describe(&outcome));

    match app.login(Credentials::new("ana@example.com", "wrong")).await {
        Ok(_) => eprintln!("login      → unexpectedly accepted"),
        Err(e) => eprintln!("login      → refused ({:?}): {e}", e.kind()),
    }

    let outcome = app
        .login(Credentials::new("ana@example.com", "correct-horse"))
        .await?;
    eprintln!("login      → {}", describe(&outcome));

    let rows = app.query(Resource::Transactions).await?;
    eprintln!("transactions: {}", serde_json::to_string_pretty(&*rows)?);

    // Two pages asking at once share one request.
    let (a, b) = tokio::join!(app.query(Resource::Dashboard), app.query(Resource::Dashboard));
    eprintln!("dashboard  → {} (same: {})", a?, b.is_ok());

    // The access token is revoked server-side; the next uncached query
    // refreshes the session and carries on.
    api.expire_access_tokens();
    if let Some(principal) = app.session().current().principal_id() {
        app.queries().invalidate(principal, Resource::Transactions);
    }
    let rows = app.query(Resource::Transactions).await?;
    eprintln!("after refresh: {} transactions", rows.as_array().map_or(0, Vec::len));

    let outcome = app.logout().await?;
    eprintln!("logout     → {}", describe(&outcome));

    let outcome = app
        .login(Credentials::new("bo@example.com", "battery-staple"))
        .await?;
    eprintln!("login (bo) → {}", describe(&outcome));
    let rows = app.query(Resource::Transactions).await?;
    eprintln!("bo sees: {rows}");

    eprintln!(
        "api calls: login={} refresh={} get={} logout={}",
        api.login_calls(),
        api.refresh_calls(),
        api.get_calls(),
        api.logout_calls()
    );

    drop(app);
    watcher.await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_render_in_layout() {
        let outcome = Outcome::Render(Rendered {
            path: "/transactions".into(),
            view: Page::Transactions,
            layout: true,
        });

        assert_eq!(describe(&outcome), "Transactions (in layout) at /transactions");
    }

    #[tokio::test]
    async fn test_seeded_accounts_are_isolated() {
        let api = seeded_api();
        let app = AppContext::with_defaults(api);
        app.start("/").await.unwrap();

        app.login(Credentials::new("bo@example.com", "battery-staple"))
            .await
            .unwrap();
        let rows = app.query(Resource::Transactions).await.unwrap();

        assert_eq!(rows.as_array().unwrap().len(), 1);
        assert_eq!(rows[0]["description"], "Bus pass");
    }
}
