//! Finding the open change request that already represents a group.
//!
//! Strategies, first hit wins:
//! 1. head branch equals the group's deterministic branch
//! 2. title equals the rendered title (case-insensitive)
//! 3. head branch is the deterministic branch plus a numeric timestamp
//!    suffix (the naming scheme used before branches were deterministic)
//! 4. titles are similar (see [`titles_similar`])
//!
//! Only open requests authored by the bot, or living on its branch prefix,
//! are considered; anything that looks like another automation tool's is
//! skipped. Strategies 2–4 never pick a request sitting on another group's
//! deterministic branch, and a request claimed by one group is invisible to
//! the groups after it. Strategies 3 and 4 also require the ecosystems
//! recorded in the request's body marker, when present, to overlap the
//! group's.

use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::body::{parse_body, BodySource};
use crate::config::{BotIdentity, ReconciliationConfig};
use crate::domain::{
    Ecosystem, ExistingChangeRequest, MatchBasis, MatchResult, RequestState, UpdateGroup,
};

static GROUPED_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"update \d+ (?:[\w-]+ )?dependencies|\((?:major|minor|patch|non-major)\)")
        .expect("grouped title regex is valid")
});

static SINGLE_PACKAGE_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"update (?:dependency )?(?P<name>[@a-z0-9._/-]+) to v?\d")
        .expect("single package title regex is valid")
});

/// Lowercase, non-alphanumerics to `-`, runs collapsed, ends trimmed.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// The branch a group always lives on, derived purely from its name.
pub fn branch_name(group_name: &str, prefix: &str) -> String {
    format!("{prefix}update-{}", slugify(group_name))
}

/// `head` is `branch` followed by `-<digits>`.
pub fn is_legacy_branch(head: &str, branch: &str) -> bool {
    head.strip_prefix(branch)
        .and_then(|rest| rest.strip_prefix('-'))
        .is_some_and(|ts| !ts.is_empty() && ts.bytes().all(|b| b.is_ascii_digit()))
}

/// Whether a request belongs to a different automation tool.
pub fn is_foreign(request: &ExistingChangeRequest, bot: &BotIdentity) -> bool {
    let head = request.head_branch.to_lowercase();
    let author = request.author.to_lowercase();
    bot.foreign_markers.iter().any(|marker| {
        let marker = marker.to_lowercase();
        head.contains(&marker) || author.contains(&marker)
    })
}

/// Open, not foreign, and authored by the bot or on its branch prefix.
pub fn is_bot_request(request: &ExistingChangeRequest, bot: &BotIdentity) -> bool {
    request.state == RequestState::Open
        && !is_foreign(request, bot)
        && (request.author.eq_ignore_ascii_case(&bot.login)
            || request.head_branch.starts_with(&bot.branch_prefix))
}

#[derive(Debug, Default, PartialEq, Eq)]
struct TitleTraits {
    actions: bool,
    docker: bool,
    grouped: bool,
    major: bool,
    package: Option<String>,
}

fn title_traits(title: &str) -> TitleTraits {
    let lower = title.to_lowercase();
    TitleTraits {
        actions: lower.contains("github action")
            || lower.contains("github-actions")
            || lower.contains("workflow"),
        docker: lower.contains("docker") || lower.contains("container image"),
        grouped: GROUPED_TITLE.is_match(&lower),
        major: lower.contains("major") && !lower.contains("non-major"),
        package: SINGLE_PACKAGE_TITLE
            .captures(&lower)
            .map(|caps| caps["name"].to_string()),
    }
}

/// Heuristic title similarity.
///
/// - If either title is a CI-action or container-image update, both must be
///   and their category flags must agree.
/// - Else if both are grouped-update titles, their major flags must agree.
/// - Else both must be single-package titles naming the same package.
pub fn titles_similar(a: &str, b: &str) -> bool {
    let ta = title_traits(a);
    let tb = title_traits(b);

    if ta.actions || tb.actions || ta.docker || tb.docker {
        return ta.actions == tb.actions && ta.docker == tb.docker;
    }
    if ta.grouped && tb.grouped {
        return ta.major == tb.major;
    }
    match (ta.package, tb.package) {
        (Some(pa), Some(pb)) => pa == pb,
        _ => false,
    }
}

/// False only when the body marker records ecosystems and none of them is
/// one of the group's.
pub fn ecosystems_overlap(request: &ExistingChangeRequest, group: &UpdateGroup) -> bool {
    let contents = parse_body(&request.body);
    if contents.source != BodySource::Marker {
        return true;
    }
    let recorded: BTreeSet<Ecosystem> =
        contents.updates.iter().filter_map(|u| u.ecosystem).collect();
    recorded.is_empty() || !recorded.is_disjoint(&group.ecosystems())
}

/// Stateful matcher for one reconciliation pass.
pub struct PrMatcher<'a> {
    config: &'a ReconciliationConfig,
    reserved_branches: HashSet<String>,
    claimed: HashSet<u64>,
}

impl<'a> PrMatcher<'a> {
    pub fn new(config: &'a ReconciliationConfig) -> Self {
        Self {
            config,
            reserved_branches: HashSet::new(),
            claimed: HashSet::new(),
        }
    }

    /// Reserve the deterministic branches of every group in the pass.
    pub fn with_groups(mut self, groups: &[UpdateGroup]) -> Self {
        self.reserved_branches = groups
            .iter()
            .map(|g| branch_name(&g.name, &self.config.bot.branch_prefix))
            .collect();
        self
    }

    /// Hide a request from every later lookup.
    pub fn claim(&mut self, number: u64) {
        self.claimed.insert(number);
    }

    pub fn is_claimed(&self, number: u64) -> bool {
        self.claimed.contains(&number)
    }

    /// Open requests this bot may act on.
    pub fn candidates<'r>(
        &self,
        open: &'r [ExistingChangeRequest],
    ) -> Vec<&'r ExistingChangeRequest> {
        open.iter()
            .filter(|r| is_bot_request(r, &self.config.bot))
            .filter(|r| !self.claimed.contains(&r.number))
            .collect()
    }

    pub fn find_match(&self, group: &UpdateGroup, open: &[ExistingChangeRequest]) -> MatchResult {
        let branch = branch_name(&group.name, &self.config.bot.branch_prefix);
        let candidates = self.candidates(open);

        if let Some(hit) = candidates.iter().find(|r| r.head_branch == branch) {
            return MatchResult::found((*hit).clone(), MatchBasis::ExactBranch);
        }

        let unreserved: Vec<&ExistingChangeRequest> = candidates
            .into_iter()
            .filter(|r| r.head_branch == branch || !self.reserved_branches.contains(&r.head_branch))
            .collect();

        if !group.title.is_empty() {
            if let Some(hit) = unreserved
                .iter()
                .find(|r| r.title.trim().eq_ignore_ascii_case(group.title.trim()))
            {
                return MatchResult::found((*hit).clone(), MatchBasis::TitleExact);
            }
        }

        if let Some(hit) = unreserved
            .iter()
            .find(|r| is_legacy_branch(&r.head_branch, &branch) && ecosystems_overlap(r, group))
        {
            return MatchResult::found((*hit).clone(), MatchBasis::LegacyBranch);
        }

        if !group.title.is_empty() {
            if let Some(hit) = unreserved
                .iter()
                .find(|r| titles_similar(&r.title, &group.title) && ecosystems_overlap(r, group))
            {
                return MatchResult::found((*hit).clone(), MatchBasis::TitleSimilarity);
            }
        }

        MatchResult::none()
    }
}

/// One-shot lookup without cross-group reservations.
pub fn find_match(
    group: &UpdateGroup,
    open: &[ExistingChangeRequest],
    config: &ReconciliationConfig,
) -> MatchResult {
    PrMatcher::new(config).find_match(group, open)
}
