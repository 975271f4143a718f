use crate::aggregate::{question_counts, summarize};
use crate::config::DashboardConfig;
use crate::error::Result;
use crate::observability;
use crate::state::AppState;
use crate::tasks::{manual_refresh, RefreshOutcome};
use axum::{
    extract::Query,
    http::{Method, StatusCode},
    response::{Html, IntoResponse, Json},
    routing::{get, post},
    Extension, Router,
};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Europe::Helsinki;
use hyper::Server;
use serde::Deserialize;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

/// Filter selectors accepted by the JSON endpoints. Unparsable values fall
/// back to the configured defaults instead of failing the request.
#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    /// ISO date, `YYYY-MM-DD`, interpreted as Helsinki local.
    pub cutoff_date: Option<String>,
    /// `HH:MM`, Helsinki local.
    pub cutoff_time: Option<String>,
    /// Kept as text so checkbox-style values (`1`, `on`) and garbage never
    /// turn into a 400 at extraction time.
    pub completed_only: Option<String>,
}

impl DashboardQuery {
    pub fn only_completed(&self) -> bool {
        self.completed_only
            .as_deref()
            .map(parse_flag)
            .unwrap_or(false)
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Cutoff for a request: the configured default with the date and/or time
/// part overridden by whatever the query supplies and parses.
pub fn resolve_cutoff(config: &DashboardConfig, query: &DashboardQuery) -> DateTime<Utc> {
    let base_utc = config.default_cutoff_utc().unwrap_or_else(|_| Utc::now());
    let base = base_utc.with_timezone(&Helsinki);
    let date = query
        .cutoff_date
        .as_deref()
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        .unwrap_or_else(|| base.date_naive());
    let time = query
        .cutoff_time
        .as_deref()
        .and_then(|s| NaiveTime::parse_from_str(s, "%H:%M").ok())
        .unwrap_or_else(|| base.time());
    Helsinki
        .from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or(base_utc)
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "limeboard",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn api_summary(
    Extension(state): Extension<AppState>,
    Query(query): Query<DashboardQuery>,
) -> impl IntoResponse {
    let snapshot = state.snapshot.read().await;
    let cutoff = resolve_cutoff(&state.dashboard, &query);
    let mut responses = crate::types::filter_by_cutoff(&snapshot.responses, cutoff);
    if query.only_completed() {
        responses = crate::types::filter_completed(&responses);
    }
    Json(summarize(&responses, snapshot.fetched_at, cutoff))
}

async fn api_questions(
    Extension(state): Extension<AppState>,
    Query(query): Query<DashboardQuery>,
) -> impl IntoResponse {
    let snapshot = state.snapshot.read().await;
    let cutoff = resolve_cutoff(&state.dashboard, &query);
    let mut responses = crate::types::filter_by_cutoff(&snapshot.responses, cutoff);
    if query.only_completed() {
        responses = crate::types::filter_completed(&responses);
    }
    Json(question_counts(
        &responses,
        &state.dashboard.questions,
        state.dashboard.title_wrap,
        state.dashboard.tick_wrap,
    ))
}

async fn admin_refresh(Extension(state): Extension<AppState>) -> impl IntoResponse {
    match manual_refresh(&state).await {
        Ok(RefreshOutcome::Refreshed { responses }) => Json(serde_json::json!({
            "status": "refreshed",
            "responses": responses
        }))
        .into_response(),
        Ok(RefreshOutcome::Throttled) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({ "status": "throttled" })),
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn metrics() -> impl IntoResponse {
    observability::render_metrics()
}

/// Dashboard shell: static page that pulls the JSON endpoints and renders
/// the counts as CSS bar charts.
async fn dashboard(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let html = DASHBOARD_HTML.replace("{{title}}", &state.dashboard.title);
    Html(html)
}

const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>{{title}}</title>
    <style>
      body { font-family: sans-serif; margin: 0; background: #f6f7f9; color: #222; }
      .container { max-width: 1100px; margin: 0 auto; padding: 16px; }
      h1 { text-align: center; }
      #intro { color: #666; margin-bottom: 12px; }
      .controls { display: flex; gap: 8px; flex-wrap: wrap; align-items: center; margin-bottom: 16px; }
      .cards { display: grid; grid-template-columns: repeat(auto-fill, minmax(440px, 1fr)); gap: 16px; }
      .card { background: #fff; border-radius: 8px; box-shadow: 0 1px 3px rgba(0,0,0,.15); padding: 16px; }
      .card h3 { margin-top: 0; font-size: 1rem; }
      .bar-row { display: flex; align-items: center; margin: 4px 0; }
      .bar-label { width: 40%; font-size: .85rem; text-align: right; padding-right: 8px; }
      .bar { background: #2c6fbb; color: #fff; font-size: .8rem; padding: 2px 6px; border-radius: 3px; min-width: 14px; }
      button { padding: 6px 14px; }
      .muted { color: #999; text-align: center; }
    </style>
  </head>
  <body>
    <div class="container">
      <h1>{{title}}</h1>
      <p id="intro">Loading…</p>
      <div class="controls">
        <button id="refresh">Update database</button>
        <span>Show data after:</span>
        <input type="date" id="cutoff-date" />
        <input type="text" id="cutoff-time" size="5" placeholder="HH:MM" />
        <label><input type="checkbox" id="completed-only" /> Completed only</label>
      </div>
      <div id="cards" class="cards"></div>
    </div>
    <script>
      function params() {
        var p = new URLSearchParams();
        var d = document.getElementById('cutoff-date').value;
        var t = document.getElementById('cutoff-time').value;
        if (d) p.set('cutoff_date', d);
        if (t) p.set('cutoff_time', t);
        if (document.getElementById('completed-only').checked) p.set('completed_only', 'true');
        return p.toString();
      }
      function render(summary, questions) {
        document.getElementById('intro').textContent =
          'This dashboard shows live results for selected survey variables. Currently ' +
          summary.unique_tokens + ' unique tokens with total ' + summary.partial +
          ' PARTIAL and ' + summary.completed + ' FULL responses. Data updated ' +
          summary.data_updated + '. Showing responses after ' + summary.showing_after + '.';
        var cards = document.getElementById('cards');
        cards.innerHTML = '';
        if (!questions.length) {
          cards.innerHTML = '<p class="muted">No responses satisfy the current criteria.</p>';
          return;
        }
        questions.forEach(function (q) {
          var max = Math.max.apply(null, q.counts.map(function (c) { return c.count; }));
          var card = document.createElement('div');
          card.className = 'card';
          card.innerHTML = '<h3>' + q.label + '</h3>';
          q.counts.forEach(function (c) {
            var row = document.createElement('div');
            row.className = 'bar-row';
            row.innerHTML = '<div class="bar-label">' + c.answer + '</div>' +
              '<div class="bar" style="width:' + Math.round((c.count / max) * 55) + '%">' + c.count + '</div>';
            card.appendChild(row);
          });
          cards.appendChild(card);
        });
      }
      function load() {
        var q = params();
        Promise.all([
          fetch('/api/summary?' + q).then(function (r) { return r.json(); }),
          fetch('/api/questions?' + q).then(function (r) { return r.json(); })
        ]).then(function (res) { render(res[0], res[1]); });
      }
      document.getElementById('refresh').addEventListener('click', function () {
        fetch('/admin/refresh', { method: 'POST' }).then(load);
      });
      ['cutoff-date', 'cutoff-time', 'completed-only'].forEach(function (id) {
        document.getElementById(id).addEventListener('change', load);
      });
      load();
      setInterval(load, 15 * 60 * 1000);
    </script>
  </body>
</html>"#;

/// Create the HTTP router with all dashboard routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/", get(dashboard))
        .route("/health", get(health))
        .route("/api/summary", get(api_summary))
        .route("/api/questions", get(api_questions))
        .route("/admin/refresh", post(admin_refresh))
        .route("/metrics", get(metrics))
        .layer(Extension(state))
        .layer(ServiceBuilder::new().layer(cors))
}

/// The `server` attribute of the builtin `app` module.
pub fn dashboard_app(state: AppState) -> Router {
    create_router(state)
}

/// Bind the listener and serve until terminated. A port already in use
/// surfaces here as an error, before any worker accepts a connection.
pub async fn start_server(router: Router, addr: SocketAddr) -> Result<()> {
    let server = Server::try_bind(&addr)?;

    println!("🚀 Dashboard running on http://{addr}");
    println!("💚 Health check: http://{addr}/health");
    println!("📈 Metrics:      http://{addr}/metrics");

    server.serve(router.into_make_service()).await?;

    Ok(())
}
