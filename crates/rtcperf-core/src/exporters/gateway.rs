//! Prometheus pushgateway sink.
//!
//! A persistent [`GaugeSet`] mirrors what the gateway should hold for the
//! run's job. Each tick updates it, then replaces the job's group with a PUT
//! of the rendered exposition text. Rule series whose window has closed are
//! removed from the set so the next PUT drops them.

use super::{
    http::{build_client, gzip, send, split_basic_auth},
    ExportError, Exporter, TickContext,
};
use crate::stats::StatField;
use async_trait::async_trait;
use metrics::Label;
use metrics_exporter_prometheus::PrometheusBuilder;
use reqwest::{header, Client, RequestBuilder};
use std::{collections::BTreeMap, time::Duration};
use tracing::{debug, info};

const PREFIX: &str = "wst";
const TIMEOUT: Duration = Duration::from_secs(5);

/// Identity of one gauge series.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GaugeKey {
    pub name: String,
    pub labels: Vec<(&'static str, String)>,
}

impl GaugeKey {
    fn new(name: String, labels: Vec<(&'static str, String)>) -> Self {
        Self { name, labels }
    }
}

/// Gauge values the gateway should currently hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GaugeSet {
    gauges: BTreeMap<GaugeKey, f64>,
}

impl GaugeSet {
    pub fn set(&mut self, name: String, labels: Vec<(&'static str, String)>, value: f64) {
        self.gauges.insert(GaugeKey::new(name, labels), value);
    }

    pub fn remove(&mut self, name: String, labels: Vec<(&'static str, String)>) {
        self.gauges.remove(&GaugeKey::new(name, labels));
    }

    #[must_use]
    pub fn get(&self, name: &str, labels: &[(&'static str, &str)]) -> Option<f64> {
        self.gauges
            .iter()
            .find(|(k, _)| {
                k.name == name
                    && k.labels.len() == labels.len()
                    && k.labels.iter().zip(labels).all(|((a, b), (c, d))| a == c && b == d)
            })
            .map(|(_, v)| *v)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.gauges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.gauges.is_empty()
    }

    pub fn clear(&mut self) {
        self.gauges.clear();
    }

    /// Folds one tick into the set.
    pub fn update(&mut self, ctx: &TickContext<'_>) {
        let datetime = ctx.start.timestamp_millis().to_string();
        let elapsed = ctx.elapsed_seconds();

        for (metric, series) in ctx.stats.iter() {
            for (label, acc) in series.iter() {
                let Some((host, codec)) = label.host_codec() else {
                    continue;
                };
                let labels = vec![
                    ("host", host.to_string()),
                    ("codec", codec.to_string()),
                    ("datetime", datetime.clone()),
                ];
                for field in StatField::ALL {
                    self.set(format!("{PREFIX}_{metric}_{field}"), labels.clone(), acc.field(field));
                }
            }
        }
        self.set(format!("{PREFIX}_elapsedTime"), vec![("datetime", datetime.clone())], elapsed);

        for (metric, rule) in ctx.rules.iter() {
            for check in &rule.checks {
                let base = format!("{PREFIX}_alert_{metric}_{}", check.stat);
                for clause in &check.clauses {
                    if !clause.has_started(elapsed) {
                        continue;
                    }
                    let remove = clause.is_expired(elapsed);
                    let description = clause.describe(&check.stat);

                    if let Some(report) = ctx.reports.get(metric, &description) {
                        let labels = vec![("rule", description.clone()), ("datetime", datetime.clone())];
                        if remove {
                            self.remove(format!("{base}_report"), labels.clone());
                            self.remove(format!("{base}_mean"), labels);
                        } else {
                            self.set(format!("{base}_report"), labels.clone(), report.fail_amount_percentile);
                            self.set(format!("{base}_mean"), labels, report.value_average);
                        }
                    }

                    for (op, threshold) in clause.thresholds() {
                        let labels = vec![
                            ("rule", format!("{metric} {} {op}", check.stat)),
                            ("datetime", datetime.clone()),
                        ];
                        if remove {
                            self.remove(base.clone(), labels);
                        } else {
                            self.set(base.clone(), labels, threshold);
                        }
                    }
                }
            }
        }

        for (tag, value) in ctx.reports.tag_rollup(ctx.rules, ctx.fail_percentile) {
            self.set(
                format!("{PREFIX}_alert_report"),
                vec![("datetime", datetime.clone()), ("tag", tag)],
                value,
            );
        }
    }

    /// Prometheus text exposition of every gauge.
    #[must_use]
    pub fn render(&self) -> String {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            for (key, value) in &self.gauges {
                let labels: Vec<Label> =
                    key.labels.iter().map(|(k, v)| Label::new(*k, v.clone())).collect();
                metrics::gauge!(key.name.clone(), labels).set(*value);
            }
        });
        handle.render()
    }
}

/// Pushes gauges to `<url>/metrics/job/<job>`.
pub struct GatewayExporter {
    client: Client,
    job_url: String,
    auth: Option<(String, String)>,
    gzip: bool,
    gauges: GaugeSet,
}

impl GatewayExporter {
    /// # Errors
    ///
    /// Returns [`ExportError::Http`] if the HTTP client cannot be built.
    pub fn new(url: &str, job: &str, auth: Option<&str>, gzip: bool) -> Result<Self, ExportError> {
        Ok(Self {
            client: build_client(TIMEOUT)?,
            job_url: format!("{}/metrics/job/{job}", url.trim_end_matches('/')),
            auth: auth.filter(|a| !a.is_empty()).map(split_basic_auth),
            gzip,
            gauges: GaugeSet::default(),
        })
    }

    #[must_use]
    pub fn gauges(&self) -> &GaugeSet {
        &self.gauges
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Some((user, password)) => request.basic_auth(user, Some(password)),
            None => request,
        }
    }

    async fn delete_job(&self) -> Result<(), ExportError> {
        debug!(url = %self.job_url, "Deleting gateway job");
        send(self.authorize(self.client.delete(&self.job_url))).await?;
        Ok(())
    }
}

#[async_trait]
impl Exporter for GatewayExporter {
    fn name(&self) -> &'static str {
        "gateway"
    }

    async fn start(&mut self) -> Result<(), ExportError> {
        info!(url = %self.job_url, "Pushgateway enabled");
        self.delete_job().await
    }

    async fn export(&mut self, ctx: &TickContext<'_>) -> Result<(), ExportError> {
        self.gauges.update(ctx);
        let body = self.gauges.render();

        let mut request = self
            .client
            .put(&self.job_url)
            .header(header::CONTENT_TYPE, "text/plain; version=0.0.4");
        request = if self.gzip {
            request.header(header::CONTENT_ENCODING, "gzip").body(gzip(body.as_bytes())?)
        } else {
            request.body(body)
        };
        send(self.authorize(request)).await?;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), ExportError> {
        self.gauges.clear();
        self.delete_job().await
    }
}
