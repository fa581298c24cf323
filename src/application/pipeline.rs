use crate::application::context::ContextAssembler;
use crate::application::retrieval::RetrievalOrchestrator;
use crate::application::stages::decision::{enforce_constraints, ConstraintOverride, DecisionInput, DecisionStage, TradingDecision};
use crate::application::stages::high_level::{DecisionReflection, DecisionReflectionInput, HighLevelReflection};
use crate::application::stages::low_level::{LowLevelReflection, PriceReflection, PriceReflectionInput};
use crate::application::stages::market_intelligence::{
    LatestIntelligence, LatestMarketIntelligence, MarketIntelligence, MarketSnapshot, PastMarketIntelligence,
    SynthesisInput,
};
use crate::application::stages::{StageRunner, UNAVAILABLE};
use crate::config::PipelineConfig;
use crate::domain::entities::decision::DecisionEntry;
use crate::domain::error::DomainError;
use crate::domain::ports::decision_journal::DecisionJournal;
use crate::domain::ports::language_model::ImageAttachment;
use crate::domain::ports::market_data::MarketDataSource;
use crate::domain::values::account::AccountStatus;
use crate::domain::values::memory_tier::MemoryTier;
use crate::domain::values::trade_action::TradeAction;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::Instrument;

const CANCEL_POLL: Duration = Duration::from_millis(250);

pub struct PipelineRequest {
    pub symbol: String,
    pub date: NaiveDate,
    pub account: AccountStatus,
    pub chart: Option<ImageAttachment>,
}

/// Everything one symbol/date run produced. Stages that failed are `None`.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: String,
    pub symbol: String,
    pub date: NaiveDate,
    pub latest_intelligence: Option<LatestIntelligence>,
    pub market_intelligence: Option<MarketIntelligence>,
    pub price_reflection: Option<PriceReflection>,
    pub decision_reflection: Option<DecisionReflection>,
    pub decision: Option<TradingDecision>,
    pub constraint_override: Option<ConstraintOverride>,
    /// Final action after the account check; `None` when the decision stage failed.
    pub action: Option<TradeAction>,
}

pub struct BackfillRequest {
    pub symbols: Vec<String>,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub account: AccountStatus,
    pub pause: Duration,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BackfillSummary {
    pub symbol: String,
    pub processed: usize,
    pub skipped: usize,
    pub undecided: usize,
    pub cancelled: bool,
}

/// Runs the four stages in order for a symbol/date and threads outputs forward.
pub struct PipelineDriver {
    context: ContextAssembler,
    retrieval: RetrievalOrchestrator,
    runner: StageRunner,
    journal: Arc<dyn DecisionJournal>,
    data: Arc<dyn MarketDataSource>,
    config: PipelineConfig,
}

impl PipelineDriver {
    pub fn new(
        context: ContextAssembler,
        retrieval: RetrievalOrchestrator,
        runner: StageRunner,
        journal: Arc<dyn DecisionJournal>,
        data: Arc<dyn MarketDataSource>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            context,
            retrieval,
            runner,
            journal,
            data,
            config,
        }
    }

    pub async fn run(&self, request: PipelineRequest) -> PipelineReport {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("pipeline", run_id = %run_id, symbol = %request.symbol, date = %request.date);
        self.run_stages(run_id, request).instrument(span).await
    }

    async fn run_stages(&self, run_id: String, request: PipelineRequest) -> PipelineReport {
        let PipelineRequest {
            symbol,
            date,
            account,
            chart,
        } = request;
        let symbol = symbol.to_uppercase();
        tracing::info!("pipeline started");

        // Stage 1: latest pass, market retrieval, synthesis pass.
        let snapshot = MarketSnapshot {
            symbol: symbol.clone(),
            date,
            news: self.context.fetch_news(&symbol, date, self.config.news_lookback_days),
            financials: self.context.fetch_financials(&symbol, date),
            price_action: self.context.fetch_price_action(&symbol, date),
        };
        let latest = self.runner.run(&LatestMarketIntelligence, &snapshot).await;
        let market = match &latest {
            Some(latest) => {
                let history = self.retrieval.market_history(date, &latest.queries.pairs()).await;
                let input = SynthesisInput {
                    symbol: symbol.clone(),
                    date,
                    latest: latest.clone(),
                    history,
                };
                self.runner.run(&PastMarketIntelligence, &input).await
            }
            None => None,
        };
        let market_summary = market
            .as_ref()
            .map(|m| m.summary.clone())
            .or_else(|| latest.as_ref().map(|l| l.summary.clone()));
        let market_text = market
            .as_ref()
            .map(MarketIntelligence::render)
            .or_else(|| latest.as_ref().map(|l| format!("Analysis: {}\nSummary: {}", l.analysis, l.summary)));

        // Stage 2: price reasoning.
        let movements = self.context.price_movements(&symbol, date);
        let direction = movements
            .as_ref()
            .map(|m| m.short_term_desc.to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        let price_input = PriceReflectionInput {
            symbol: symbol.clone(),
            date,
            market_summary: market_summary.clone(),
            movements,
            chart: chart.clone(),
        };
        let price = self.runner.run(&LowLevelReflection, &price_input).await;
        let price_text = price.as_ref().map(PriceReflection::render);

        // Stage 3: reflection on past decisions.
        let price_query = price
            .as_ref()
            .map(|p| p.query.clone())
            .unwrap_or_else(|| format!("Reasoning for {symbol} price movement: {direction}"));
        let reflection_input = DecisionReflectionInput {
            symbol: symbol.clone(),
            date,
            market_summary,
            price_reasoning: price_text.clone(),
            past_decisions: self
                .context
                .past_decisions(&symbol, date, self.config.retrieval.decision_window),
            history: self
                .retrieval
                .reflection_history(MemoryTier::PriceReflection, date, &price_query)
                .await,
            chart,
        };
        let reflection = self.runner.run(&HighLevelReflection, &reflection_input).await;

        // Stage 4: decision and account check.
        let lesson_query = reflection
            .as_ref()
            .map(|r| r.query.clone())
            .unwrap_or_else(|| format!("Lessons from past {symbol} trading decisions"));
        let past_lessons = self
            .retrieval
            .reflection_history(MemoryTier::DecisionReflection, date, &lesson_query)
            .await;
        let current_lesson = reflection
            .as_ref()
            .map(DecisionReflection::render)
            .unwrap_or_else(|| UNAVAILABLE.to_string());
        let current_price = self.context.current_price(&symbol, date);
        let decision_input = DecisionInput {
            symbol: symbol.clone(),
            date,
            market_intelligence: market_text,
            price_reasoning: price_text,
            lessons: format!("Current reflection:\n{current_lesson}\n\nPast lessons:\n{past_lessons}"),
            technical_signals: self.context.technical_signals(&symbol, date),
            account,
            current_price,
        };

        let (decision, constraint_override) = match self.runner.run(&DecisionStage, &decision_input).await {
            Some(proposed) => {
                let (decision, overridden) = enforce_constraints(proposed, &account, current_price);
                if let Some(o) = &overridden {
                    tracing::warn!(proposed = %o.proposed, reason = %o.reason, "decision overridden to HOLD");
                }
                self.journal_decision(&symbol, date, &decision, current_price);
                (Some(decision), overridden)
            }
            None => (None, None),
        };

        let action = decision.as_ref().map(|d| d.action);
        match action {
            Some(action) => tracing::info!(%action, "pipeline finished"),
            None => tracing::warn!("pipeline finished without a decision"),
        }

        PipelineReport {
            run_id,
            symbol,
            date,
            latest_intelligence: latest,
            market_intelligence: market,
            price_reflection: price,
            decision_reflection: reflection,
            decision,
            constraint_override,
            action,
        }
    }

    fn journal_decision(&self, symbol: &str, date: NaiveDate, decision: &TradingDecision, price: Option<f64>) {
        let entry = DecisionEntry::new(symbol, date, decision.action, price, decision.reasoning.clone());
        if let Err(e) = self.journal.record(&entry) {
            tracing::error!(error = %e, "failed to journal decision");
        }
    }

    /// Walks each symbol's trading days in order, one task per symbol.
    pub async fn backfill(
        self: &Arc<Self>,
        request: BackfillRequest,
        cancel: Arc<AtomicBool>,
    ) -> Result<Vec<BackfillSummary>, DomainError> {
        if request.from > request.to {
            return Err(DomainError::InvalidInput(format!(
                "Backfill start {} is after end {}",
                request.from, request.to
            )));
        }
        // One task per distinct symbol, so no two tasks write the same ids.
        let mut symbols: Vec<String> = request
            .symbols
            .iter()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        symbols.sort();
        symbols.dedup();
        if symbols.is_empty() {
            return Err(DomainError::InvalidInput("Backfill needs at least one symbol".into()));
        }

        let mut tasks = JoinSet::new();
        for symbol in symbols {
            let driver = Arc::clone(self);
            let cancel = Arc::clone(&cancel);
            let (from, to, account, pause) = (request.from, request.to, request.account, request.pause);
            tasks.spawn(async move { driver.backfill_symbol(symbol, from, to, account, pause, &cancel).await });
        }

        let mut summaries = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(summary) => summaries.push(summary),
                Err(e) => tracing::error!(error = %e, "backfill task panicked"),
            }
        }
        summaries.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(summaries)
    }

    async fn backfill_symbol(
        &self,
        symbol: String,
        from: NaiveDate,
        to: NaiveDate,
        account: AccountStatus,
        pause: Duration,
        cancel: &AtomicBool,
    ) -> BackfillSummary {
        let mut summary = BackfillSummary {
            symbol: symbol.clone(),
            ..Default::default()
        };

        for date in from.iter_days().take_while(|d| *d <= to) {
            if cancel.load(Ordering::SeqCst) {
                summary.cancelled = true;
                break;
            }
            match self.data.has_bar_on(&symbol, date) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(%symbol, %date, "no trading on this date, skipping");
                    summary.skipped += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(%symbol, %date, error = %e, "trading-day check failed, skipping");
                    summary.skipped += 1;
                    continue;
                }
            }

            let report = self
                .run(PipelineRequest {
                    symbol: symbol.clone(),
                    date,
                    account,
                    chart: None,
                })
                .await;
            summary.processed += 1;
            if report.action.is_none() {
                summary.undecided += 1;
            }

            if date < to && !pause.is_zero() && !wait_or_cancel(pause, cancel).await {
                summary.cancelled = true;
                break;
            }
        }

        tracing::info!(
            %symbol,
            processed = summary.processed,
            skipped = summary.skipped,
            cancelled = summary.cancelled,
            "backfill finished"
        );
        summary
    }
}

/// Sleeps for `pause`, returning `false` early if cancellation is requested.
async fn wait_or_cancel(pause: Duration, cancel: &AtomicBool) -> bool {
    let deadline = tokio::time::Instant::now() + pause;
    loop {
        if cancel.load(Ordering::SeqCst) {
            return false;
        }
        let now = tokio::time::Instant::now();
        if now >= deadline {
            return true;
        }
        tokio::time::sleep(CANCEL_POLL.min(deadline - now)).await;
    }
}
