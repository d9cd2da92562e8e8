//! Fast Router
//!
//! Deterministic first-pass routing. Confident matches go straight to one
//! handler; everything else is handed to the supervisor with hints about
//! what was seen:
//! - Exact patterns: unambiguous phrasings, base confidence 0.95
//! - Keyword scoring: weighted keyword hits normalized by question length

use crate::models::{
    AgentType, ContextHints, InvestmentStage, KeywordScore, RouterDecision, RoutingContext,
};
use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

/// Confidence at or above which the router dispatches directly
pub const DIRECT_ROUTE_THRESHOLD: f64 = 0.85;

const EXACT_PATTERN_CONFIDENCE: f64 = 0.95;
const MIN_WORD_COUNT: usize = 5;
const MAX_KEYWORD_SCORE: f64 = 10.0;

/// A compiled routing pattern.
///
/// `exclude_after` lists words that must not directly follow the match
/// ("what is my ..." is not an education question).
struct ExactPattern {
    source: &'static str,
    regex: Regex,
    exclude_after: &'static [&'static str],
}

impl ExactPattern {
    fn new(source: &'static str) -> Self {
        Self::excluding(source, &[])
    }

    fn excluding(source: &'static str, exclude_after: &'static [&'static str]) -> Self {
        Self {
            source,
            regex: Regex::new(source).expect("routing pattern should compile"),
            exclude_after,
        }
    }

    fn is_match(&self, text: &str) -> bool {
        self.regex
            .find_iter(text)
            .any(|m| !self.is_excluded(&text[m.end()..]))
    }

    fn is_excluded(&self, rest: &str) -> bool {
        let rest = rest.trim_start();
        self.exclude_after
            .iter()
            .any(|word| starts_with_word(rest, word))
    }
}

/// `text` begins with `word` and the word is not a prefix of a longer one.
fn starts_with_word(text: &str, word: &str) -> bool {
    match text.strip_prefix(word) {
        Some(after) => !after.chars().next().map_or(false, |c| c.is_alphanumeric()),
        None => false,
    }
}

/// Subjects that make an education phrasing a company question instead
const EDUCATION_EXCLUSIONS: &[&str] = &[
    "my", "the market", "market",
    // Tracked companies
    "apple", "tesla", "microsoft", "google", "amazon", "nvidia", "meta", "netflix",
    "facebook", "oracle", "intel", "boeing", "disney", "walmart", "jpmorgan",
    // Tracked tickers
    "aapl", "tsla", "msft", "googl", "goog", "amzn", "nvda", "nflx", "crm", "amd",
    "intc", "orcl", "ibm", "wmt", "jpm", "bac",
    "voo", "vti", "spy", "qqq", "ivv",
];

lazy_static! {
    /// Ordered pattern table. Agent order decides which match wins.
    static ref EXACT_PATTERNS: Vec<(AgentType, Vec<ExactPattern>)> = vec![
        (AgentType::Portfolio, vec![
            ExactPattern::new(r"(?:how (?:is|did)|what's|analyze) my portfolio"),
            ExactPattern::new(r"my portfolio (?:performance|return|diversification|risk|value|allocation)"),
            ExactPattern::new(r"analyze my (?:holdings|investments|positions)"),
            ExactPattern::new(r"(?:am i|is my portfolio) (?:diversified|concentrated|balanced)"),
            ExactPattern::new(r"compare (?:my )?portfolio (?:to|vs|against) (?:s&p|benchmark|market)"),
            ExactPattern::new(r"rebalanc(?:e|ing) (?:my )?portfolio"),
            ExactPattern::new(r"\bmy (?:stocks|shares|holdings|positions)\b"),
        ]),
        (AgentType::GoalPlanning, vec![
            ExactPattern::new(r"(?:i want to|i need to|help me) save (?:for|up)"),
            ExactPattern::new(r"(?:create|set|make|plan|build) (?:a )?(?:financial )?goal"),
            ExactPattern::new(r"how much (?:do i need to|should i|must i) save"),
            ExactPattern::new(r"saving for (?:a )?(?:house|home|car|education|college|wedding|retirement|vacation)"),
            ExactPattern::new(r"retirement (?:goal|planning|savings|fund)"),
            ExactPattern::new(r"(?:am i|is my goal) on track"),
            ExactPattern::new(r"prioritize (?:my )?goals"),
            ExactPattern::new(r"update (?:my )?goal"),
            ExactPattern::new(r"(?:goal|savings) (?:progress|status|update)"),
        ]),
        (AgentType::Market, vec![
            // Price lookups
            ExactPattern::new(r"(?:what(?:'s| is)|what's the|get|show|tell me) (?:the )?\w+(?:'s)? (?:stock |etf |share )?(?:price|max price|closing price|opening price|current price)\b"),
            ExactPattern::new(r"\b\w+(?:'s)? (?:stock|etf|share) (?:price|max price|high|low|52.week)\b"),
            // Performance and returns
            ExactPattern::new(r"(?:what(?:'s| is)|what's the|show|get) (?:the )?(?:performance|returns?|gains?) (?:of|for|on)"),
            ExactPattern::new(r"(?:how|what) (?:has|have|is|are) .+? (?:performed|performing|returned|done)"),
            ExactPattern::new(r"performance (?:of|for) .+? (?:over|in|during|for) (?:\d+[ymd]|year|month|lifetime|ytd)"),
            ExactPattern::new(r"\b(?:1|5|10) (?:year|yr|y) (?:performance|return|gains?)"),
            ExactPattern::new(r"(?:lifetime|historical|past) (?:performance|returns?)"),
            // Tickers
            ExactPattern::new(r"\b(?:aapl|tsla|msft|googl|amzn|nvda|meta|nflx|fb|goog|crm|amd|intc|orcl|ibm|wmt|jpm|bac)\b"),
            ExactPattern::new(r"\b(?:voo|vti|spy|qqq|ivv|vea|vwo|agg|bnd|vig|vym|schd|vug|vtv)\b"),
            ExactPattern::new(r"(?:apple|tesla|microsoft|google|amazon|nvidia|meta|netflix|facebook|oracle|intel|boeing|disney|walmart|jpmorgan)\s+(?:stock|share)"),
            ExactPattern::new(r"(?:vanguard|ishares|spdr|schwab|fidelity) .+? (?:etf|fund)"),
            // Market overview
            ExactPattern::new(r"what's the market (?:doing|performance|status)"),
            ExactPattern::new(r"how (?:is|are) (?:the )?(?:s&p|nasdaq|dow|(?:stock )?market|indices)"),
            ExactPattern::new(r"(?:sector|industry) performance"),
            // Technicals
            ExactPattern::new(r"technical analysis (?:of|for) \w+"),
            ExactPattern::new(r"\b(?:rsi|moving average|macd|beta|volatility) (?:of|for) \w+"),
            ExactPattern::new(r"compare (?:the )?fundamentals (?:of|for|between)"),
            ExactPattern::new(r"(?:stock|market) technicals"),
            // Earnings and sentiment
            ExactPattern::new(r"earnings (?:calendar|report|announcement)"),
            ExactPattern::new(r"market (?:overview|sentiment|breadth|conditions)"),
        ]),
        (AgentType::News, vec![
            ExactPattern::new(r"should i invest in \w+"),
            ExactPattern::new(r"(?:thinking about|considering|researching) investing"),
            ExactPattern::new(r"what are (?:the )?(?:investment )?risks? (?:of|for|in) \w+"),
            ExactPattern::new(r"investment (?:thesis|case|opportunity|analysis) (?:for|of|on)"),
            ExactPattern::new(r"is (?:now|this|it) (?:a )?good time to (?:invest|buy)"),
            ExactPattern::new(r"(?:bull|bear) case (?:for|of|on) \w+"),
            ExactPattern::new(r"compare .+ (?:for investment|to invest|as an? investment)"),
            ExactPattern::new(r"due diligence (?:on|for) \w+"),
            ExactPattern::new(r"(?:investment )?(?:timing|opportunity) (?:for|of)"),
            ExactPattern::new(r"watchlist (?:news|updates?)"),
        ]),
        (AgentType::Education, vec![
            ExactPattern::excluding(r"what (?:is|are|does) (?:a |an |the )?", EDUCATION_EXCLUSIONS),
            ExactPattern::excluding(r"(?:explain|define|describe|clarify) (?:what |how |why )?", EDUCATION_EXCLUSIONS),
            ExactPattern::new(r"how (?:do|does) .+? work"),
            ExactPattern::new(r"(?:what's the |what is the )?difference between"),
            ExactPattern::excluding(r"(?:tell me about|teach me about|help me understand)", EDUCATION_EXCLUSIONS),
            ExactPattern::new(r"(?:learn|understand) (?:about |how |what )"),
        ]),
    ];
}

/// Static keyword tables, `(keyword, weight)`, matched as lower-case substrings
const PORTFOLIO_KEYWORDS: &[(&str, u32)] = &[
    ("portfolio", 3), ("holdings", 3), ("positions", 3), ("my stocks", 3),
    ("diversification", 3), ("concentration", 3), ("allocation", 3),
    ("rebalance", 3), ("my shares", 3),
    ("invested", 2), ("sharpe", 2), ("beta", 2), ("volatility", 2),
    ("risk", 2), ("performance", 2), ("return", 2), ("benchmark", 2),
    ("value", 1), ("stocks", 1), ("shares", 1),
];

const GOAL_PLANNING_KEYWORDS: &[(&str, u32)] = &[
    ("goal", 3), ("save", 3), ("saving", 3), ("target", 3),
    ("retirement", 3), ("emergency fund", 3), ("down payment", 3),
    ("plan", 2), ("need", 2), ("afford", 2), ("years", 2),
    ("monthly", 2), ("annual", 2), ("priority", 2),
    ("money", 1), ("future", 1), ("fund", 1), ("budget", 1),
];

const MARKET_KEYWORDS: &[(&str, u32)] = &[
    // Tickers
    ("aapl", 4), ("tsla", 4), ("msft", 4), ("googl", 4), ("amzn", 4), ("nvda", 4), ("meta", 4),
    ("voo", 4), ("vti", 4), ("spy", 4), ("qqq", 4), ("ivv", 4),
    // Performance and price
    ("performance", 4), ("returns", 4), ("return", 4), ("gains", 4),
    ("stock price", 4), ("max price", 4), ("stock high", 4), ("stock low", 4),
    ("52-week", 4), ("52 week", 4), ("all-time high", 4),
    ("1 year", 4), ("5 year", 4), ("10 year", 4), ("lifetime", 4), ("ytd", 4),
    ("performed", 4), ("performing", 4),
    // Market data
    ("market", 3), ("sector", 3), ("index", 3), ("indices", 3),
    ("s&p", 3), ("nasdaq", 3), ("dow jones", 3), ("technical", 3),
    ("fundamentals", 3), ("earnings", 3), ("etf", 3), ("vanguard", 3),
    ("rsi", 2), ("moving average", 2), ("p/e", 2), ("pe ratio", 2),
    ("revenue", 2), ("macd", 2), ("momentum", 2),
    ("apple", 2), ("tesla", 2), ("microsoft", 2), ("google", 2), ("amazon", 2),
    ("price", 1), ("stock", 1), ("trading", 1), ("volume", 1), ("high", 1), ("low", 1),
];

const NEWS_KEYWORDS: &[(&str, u32)] = &[
    ("should i invest", 3), ("investment", 3), ("risks", 3),
    ("opportunity", 3), ("timing", 3), ("thesis", 3),
    ("bull case", 3), ("bear case", 3), ("due diligence", 3),
    ("news", 2), ("recent", 2), ("developments", 2),
    ("considering", 2), ("thinking about", 2), ("researching", 2),
    ("watchlist", 2),
    ("buy", 1), ("research", 1), ("looking at", 1), ("interested", 1),
];

const EDUCATION_KEYWORDS: &[(&str, u32)] = &[
    ("what is", 3), ("explain", 3), ("how does", 3),
    ("difference between", 3), ("teach me", 3), ("define", 3),
    ("learn", 2), ("understand", 2), ("concept", 2), ("work", 2),
    ("help", 1), ("question", 1), ("about", 1),
];

/// Scoring order; ties keep this order.
const KEYWORD_TABLES: [(AgentType, &[(&str, u32)]); 5] = [
    (AgentType::Portfolio, PORTFOLIO_KEYWORDS),
    (AgentType::GoalPlanning, GOAL_PLANNING_KEYWORDS),
    (AgentType::Market, MARKET_KEYWORDS),
    (AgentType::News, NEWS_KEYWORDS),
    (AgentType::Education, EDUCATION_KEYWORDS),
];

/// Detailed breakdown of a routing decision, for debugging
#[derive(Debug, Clone, Serialize)]
pub struct RoutingAnalysis {
    pub pattern_matches: IndexMap<AgentType, Vec<String>>,
    pub keyword_scores: Vec<KeywordScore>,
    pub decision: RouterDecision,
}

/// Fast router
pub struct FastRouter;

impl FastRouter {
    /// Route a question. Pure and deterministic.
    pub fn route(question: &str, context: Option<&RoutingContext>) -> RouterDecision {
        let question_lower = question.to_lowercase();

        if let Some((agent, pattern)) = first_pattern_match(&question_lower) {
            let confidence = match context {
                Some(ctx) => adjust_for_context(EXACT_PATTERN_CONFIDENCE, agent, ctx),
                None => EXACT_PATTERN_CONFIDENCE,
            };
            let hints = ContextHints {
                pattern_matched: Some(pattern.to_string()),
                ..Default::default()
            };

            if confidence >= DIRECT_ROUTE_THRESHOLD {
                return RouterDecision::direct(
                    agent,
                    confidence,
                    format!("Exact pattern match: '{}'", pattern),
                    hints,
                );
            }
            return RouterDecision::supervisor(
                confidence,
                format!(
                    "Pattern match for {} below threshold after context adjustment ({:.2})",
                    agent, confidence
                ),
                hints,
            );
        }

        Self::route_by_keywords(&question_lower, context)
    }

    fn route_by_keywords(question_lower: &str, context: Option<&RoutingContext>) -> RouterDecision {
        let ranked = ranked_keyword_scores(question_lower);
        let (winner, winner_score) = (ranked[0].agent, ranked[0].score);
        let runner_up_score = ranked.get(1).map_or(0.0, |s| s.score);
        let margin = winner_score - runner_up_score;

        if winner_score == 0.0 {
            return RouterDecision::supervisor(
                0.0,
                "No confident pattern or keyword match found".to_string(),
                ContextHints::default(),
            );
        }

        let mut confidence = (winner_score / MAX_KEYWORD_SCORE).min(0.9);
        if margin > 3.0 {
            confidence += 0.10;
        } else if margin > 2.0 {
            confidence += 0.05;
        } else if margin < 1.0 {
            confidence -= 0.15;
        }
        if let Some(ctx) = context {
            confidence = adjust_for_context(confidence, winner, ctx);
        }
        let confidence = confidence.clamp(0.0, 1.0);

        let hints = ContextHints {
            pattern_matched: None,
            keyword_scores: ranked.iter().take(3).cloned().collect(),
            winner_score: Some(winner_score),
            margin: Some(margin),
        };
        let reasoning = format!(
            "Keyword score: {:.2} (margin: {:.2})",
            winner_score, margin
        );

        if confidence >= DIRECT_ROUTE_THRESHOLD {
            RouterDecision::direct(winner, confidence, reasoning, hints)
        } else {
            RouterDecision::supervisor(confidence, reasoning, hints)
        }
    }

    /// Every pattern hit, every keyword score, and the decision itself.
    pub fn analyze(question: &str, context: Option<&RoutingContext>) -> RoutingAnalysis {
        let question_lower = question.to_lowercase();

        let mut pattern_matches = IndexMap::new();
        for (agent, patterns) in EXACT_PATTERNS.iter() {
            let hits: Vec<String> = patterns
                .iter()
                .filter(|p| p.is_match(&question_lower))
                .map(|p| p.source.to_string())
                .collect();
            if !hits.is_empty() {
                pattern_matches.insert(*agent, hits);
            }
        }

        RoutingAnalysis {
            pattern_matches,
            keyword_scores: ranked_keyword_scores(&question_lower),
            decision: Self::route(question, context),
        }
    }
}

fn first_pattern_match(question_lower: &str) -> Option<(AgentType, &'static str)> {
    EXACT_PATTERNS.iter().find_map(|(agent, patterns)| {
        patterns
            .iter()
            .find(|p| p.is_match(question_lower))
            .map(|p| (*agent, p.source))
    })
}

/// Normalized keyword score in `[0, 10]`
fn keyword_score(question_lower: &str, keywords: &[(&str, u32)]) -> f64 {
    let raw: u32 = keywords
        .iter()
        .filter(|(kw, _)| question_lower.contains(kw))
        .map(|(_, weight)| weight)
        .sum();

    let word_count = question_lower.split_whitespace().count().max(MIN_WORD_COUNT);
    (raw as f64 / word_count as f64 * 10.0).min(MAX_KEYWORD_SCORE)
}

/// All agents, highest score first. The sort is stable so ties keep table order.
fn ranked_keyword_scores(question_lower: &str) -> Vec<KeywordScore> {
    let mut scores: Vec<KeywordScore> = KEYWORD_TABLES
        .iter()
        .map(|(agent, keywords)| KeywordScore {
            agent: *agent,
            score: keyword_score(question_lower, keywords),
        })
        .collect();
    scores.sort_by(|a, b| b.score.total_cmp(&a.score));
    scores
}

fn adjust_for_context(confidence: f64, agent: AgentType, ctx: &RoutingContext) -> f64 {
    let mut confidence = confidence;
    let user = &ctx.user_context;

    // Topic continuity
    if ctx.last_agent == Some(agent) {
        confidence += 0.05;
    }

    match agent {
        AgentType::Portfolio if user.has_portfolio == Some(false) => confidence -= 0.20,
        AgentType::GoalPlanning if !user.active_goals.is_empty() => confidence += 0.05,
        AgentType::News if user.investment_stage == InvestmentStage::Potential => {
            confidence += 0.05
        }
        _ => {}
    }

    confidence.clamp(0.0, 1.0)
}
