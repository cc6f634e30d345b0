//! The query tree and the boolean-query rewrite pipeline, per spec.md
//! §4.8 and §9's "small closed set of variants (term, boolean, ...
//! point-range, ... matchall, matchnone)".

use crate::error::{Error, Result};

pub const DEFAULT_MAX_CLAUSE_COUNT: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occur {
    Must,
    Should,
    MustNot,
    Filter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub occur: Occur,
    pub query: Query,
}

impl Clause {
    pub fn new(occur: Occur, query: Query) -> Self {
        Clause { occur, query }
    }
}

/// A conjunction/disjunction of sub-clauses plus a minimum-should-match
/// threshold, per spec.md §4.8.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BooleanQuery {
    pub clauses: Vec<Clause>,
    pub minimum_should_match: usize,
}

impl BooleanQuery {
    pub fn new() -> Self {
        BooleanQuery::default()
    }

    pub fn add(mut self, occur: Occur, query: Query) -> Self {
        self.clauses.push(Clause::new(occur, query));
        self
    }

    pub fn with_minimum_should_match(mut self, n: usize) -> Self {
        self.minimum_should_match = n;
        self
    }

    fn of(&self, occur: Occur) -> impl Iterator<Item = &Query> {
        self.clauses.iter().filter(move |c| c.occur == occur).map(|c| &c.query)
    }

    fn count(&self, occur: Occur) -> usize {
        self.clauses.iter().filter(|c| c.occur == occur).count()
    }
}

/// The closed set of query shapes the core evaluates, per spec.md §9.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Term {
        field: String,
        term: Vec<u8>,
        boost: f32,
    },
    /// A multi-term expansion by shared prefix (spec.md §8 S1, §4.8's
    /// "constant-score multi-term rewrite").
    Prefix {
        field: String,
        prefix: Vec<u8>,
        boost: f32,
    },
    Boolean(Box<BooleanQuery>),
    PointRange {
        field: String,
        num_dims: usize,
        bytes_per_dim: usize,
        lower: Vec<u8>,
        upper: Vec<u8>,
    },
    ConstantScore(Box<Query>, f32),
    MatchAll,
    MatchNone,
}

impl Query {
    pub fn term(field: impl Into<String>, term: impl Into<Vec<u8>>) -> Query {
        Query::Term {
            field: field.into(),
            term: term.into(),
            boost: 1.0,
        }
    }

    pub fn prefix(field: impl Into<String>, prefix: impl Into<Vec<u8>>) -> Query {
        Query::Prefix {
            field: field.into(),
            prefix: prefix.into(),
            boost: 1.0,
        }
    }

    /// Rewrites a boolean query to a fixed point, applying the 8 rules of
    /// spec.md §4.8 in sequence each pass, recursing into children first.
    /// `max_clause_count` bounds a single `BooleanQuery` node's clause
    /// count (spec.md §7's `TooManyClauses`).
    pub fn rewrite(self, max_clause_count: usize) -> Result<Query> {
        let mut current = self;
        loop {
            let (next, changed) = rewrite_once(current, max_clause_count)?;
            current = next;
            if !changed {
                return Ok(current);
            }
        }
    }
}

fn rewrite_once(query: Query, max_clause_count: usize) -> Result<(Query, bool)> {
    let Query::Boolean(bq) = query else {
        return Ok((query, false));
    };
    let mut bq = *bq;
    let mut changed = false;

    // Rule 2: recursively rewrite every child first.
    for clause in &mut bq.clauses {
        let (rewritten, child_changed) = rewrite_once(clause.query.clone(), max_clause_count)?;
        if child_changed {
            clause.query = rewritten;
            changed = true;
        }
    }

    if bq.clauses.len() > max_clause_count {
        return Err(Error::TooManyClauses { limit: max_clause_count });
    }

    // Rule 1: a lone clause collapses.
    if bq.clauses.len() == 1 {
        let clause = bq.clauses.into_iter().next().unwrap();
        let collapsed = match clause.occur {
            Occur::Should if bq.minimum_should_match <= 1 => clause.query,
            Occur::Must => clause.query,
            Occur::Filter => Query::ConstantScore(Box::new(clause.query), 0.0),
            Occur::MustNot => Query::MatchNone,
            // A single SHOULD can satisfy at most one vote; mmsm > 1 can
            // never be met.
            Occur::Should => Query::MatchNone,
        };
        return Ok((collapsed, true));
    }

    // Rule 3: dedup FILTER and MUST_NOT (unordered sets).
    let before = bq.clauses.len();
    dedup_occur(&mut bq, Occur::Filter);
    dedup_occur(&mut bq, Occur::MustNot);
    if bq.clauses.len() != before {
        changed = true;
    }

    // Rule 4: MUST_NOT intersecting MUST or FILTER -> match-none.
    let must_not: Vec<Query> = bq.of(Occur::MustNot).cloned().collect();
    let required: Vec<Query> = bq.of(Occur::Must).chain(bq.of(Occur::Filter)).cloned().collect();
    if must_not.iter().any(|q| required.contains(q)) {
        return Ok((Query::MatchNone, true));
    }

    // Rule 5: remove FILTER clauses equal to a MUST clause; remove
    // match-all from FILTER.
    let must: Vec<Query> = bq.of(Occur::Must).cloned().collect();
    let before = bq.clauses.len();
    bq.clauses.retain(|c| {
        if c.occur != Occur::Filter {
            return true;
        }
        if matches!(c.query, Query::MatchAll) {
            return false;
        }
        !must.contains(&c.query)
    });
    if bq.clauses.len() != before {
        changed = true;
    }

    // Rule 6: a clause that is both SHOULD and FILTER promotes to MUST.
    let should_and_filter: Vec<Query> = {
        let should: Vec<Query> = bq.of(Occur::Should).cloned().collect();
        let filter: Vec<Query> = bq.of(Occur::Filter).cloned().collect();
        should.into_iter().filter(|q| filter.contains(q)).collect()
    };
    if !should_and_filter.is_empty() {
        for q in &should_and_filter {
            // Remove one SHOULD and one FILTER occurrence of q, add one MUST.
            if let Some(pos) = bq.clauses.iter().position(|c| c.occur == Occur::Should && &c.query == q) {
                bq.clauses.remove(pos);
            }
            if let Some(pos) = bq.clauses.iter().position(|c| c.occur == Occur::Filter && &c.query == q) {
                bq.clauses.remove(pos);
            }
            bq.clauses.push(Clause::new(Occur::Must, q.clone()));
        }
        bq.minimum_should_match = bq.minimum_should_match.saturating_sub(should_and_filter.len());
        changed = true;
    }

    // Rule 7: sum boosts of duplicate SHOULD/MUST clauses with the same
    // query (boost isn't part of `Query`'s `PartialEq` payload here since
    // `Query::Term`/`Query::Prefix` carry their own boost field, so two
    // clauses are "the same query" only once their boost-less shape
    // matches; term/prefix queries compare boost too, so bump it in place
    // instead of via equality-driven merge for those variants).
    changed |= sum_duplicate_boosts(&mut bq, Occur::Should);
    changed |= sum_duplicate_boosts(&mut bq, Occur::Must);

    // Rule 8: MUST(match-all) with only FILTERs left -> constant-score.
    let non_filter_non_mustall: usize = bq
        .clauses
        .iter()
        .filter(|c| c.occur != Occur::Filter && !(c.occur == Occur::Must && matches!(c.query, Query::MatchAll)))
        .count();
    let has_match_all_must = bq.clauses.iter().any(|c| c.occur == Occur::Must && matches!(c.query, Query::MatchAll));
    if has_match_all_must && non_filter_non_mustall == 0 && !bq.clauses.is_empty() {
        let filters: Vec<Clause> = bq
            .clauses
            .into_iter()
            .filter(|c| c.occur == Occur::Filter)
            .collect();
        let wrapped = BooleanQuery {
            clauses: filters,
            minimum_should_match: 0,
        };
        return Ok((Query::ConstantScore(Box::new(Query::Boolean(Box::new(wrapped))), 1.0), true));
    }

    Ok((Query::Boolean(Box::new(bq)), changed))
}

fn dedup_occur(bq: &mut BooleanQuery, occur: Occur) {
    let mut seen: Vec<Query> = Vec::new();
    bq.clauses.retain(|c| {
        if c.occur != occur {
            return true;
        }
        if seen.contains(&c.query) {
            false
        } else {
            seen.push(c.query.clone());
            true
        }
    });
}

fn sum_duplicate_boosts(bq: &mut BooleanQuery, occur: Occur) -> bool {
    let mut changed = false;
    let mut i = 0;
    while i < bq.clauses.len() {
        if bq.clauses[i].occur != occur {
            i += 1;
            continue;
        }
        let mut j = i + 1;
        while j < bq.clauses.len() {
            if bq.clauses[j].occur == occur && same_shape(&bq.clauses[j].query, &bq.clauses[i].query) {
                let extra_boost = boost_of(&bq.clauses[j].query);
                add_boost(&mut bq.clauses[i].query, extra_boost);
                bq.clauses.remove(j);
                changed = true;
            } else {
                j += 1;
            }
        }
        i += 1;
    }
    changed
}

/// Whether two queries are "the same clause" for dedup/boost-merge
/// purposes, ignoring their own boost field.
fn same_shape(a: &Query, b: &Query) -> bool {
    match (a, b) {
        (Query::Term { field: f1, term: t1, .. }, Query::Term { field: f2, term: t2, .. }) => f1 == f2 && t1 == t2,
        (Query::Prefix { field: f1, prefix: p1, .. }, Query::Prefix { field: f2, prefix: p2, .. }) => {
            f1 == f2 && p1 == p2
        }
        _ => a == b,
    }
}

fn boost_of(q: &Query) -> f32 {
    match q {
        Query::Term { boost, .. } | Query::Prefix { boost, .. } => *boost,
        _ => 1.0,
    }
}

fn add_boost(q: &mut Query, extra: f32) {
    match q {
        Query::Term { boost, .. } | Query::Prefix { boost, .. } => *boost += extra,
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lone_must_collapses_to_child() {
        let bq = BooleanQuery::new().add(Occur::Must, Query::term("body", b"fox".to_vec()));
        let rewritten = Query::Boolean(Box::new(bq)).rewrite(DEFAULT_MAX_CLAUSE_COUNT).unwrap();
        assert_eq!(rewritten, Query::term("body", b"fox".to_vec()));
    }

    #[test]
    fn must_not_intersecting_must_is_match_none() {
        let t = Query::term("body", b"fox".to_vec());
        let bq = BooleanQuery::new()
            .add(Occur::Must, t.clone())
            .add(Occur::MustNot, t);
        let rewritten = Query::Boolean(Box::new(bq)).rewrite(DEFAULT_MAX_CLAUSE_COUNT).unwrap();
        assert_eq!(rewritten, Query::MatchNone);
    }

    #[test]
    fn duplicate_should_boosts_sum() {
        let t = Query::term("body", b"fox".to_vec());
        let bq = BooleanQuery::new().add(Occur::Should, t.clone()).add(Occur::Should, t);
        let rewritten = Query::Boolean(Box::new(bq)).rewrite(DEFAULT_MAX_CLAUSE_COUNT).unwrap();
        match rewritten {
            Query::Term { boost, .. } => assert_eq!(boost, 2.0),
            other => panic!("expected collapsed term query, got {other:?}"),
        }
    }

    #[test]
    fn rewrite_is_idempotent() {
        let bq = BooleanQuery::new()
            .add(Occur::Should, Query::term("body", b"a".to_vec()))
            .add(Occur::Should, Query::term("body", b"b".to_vec()))
            .add(Occur::Must, Query::term("body", b"c".to_vec()))
            .with_minimum_should_match(1);
        let once = Query::Boolean(Box::new(bq)).rewrite(DEFAULT_MAX_CLAUSE_COUNT).unwrap();
        let twice = once.clone().rewrite(DEFAULT_MAX_CLAUSE_COUNT).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn too_many_clauses_errors() {
        let mut bq = BooleanQuery::new();
        for i in 0..10 {
            bq = bq.add(Occur::Should, Query::term("body", vec![i as u8]));
        }
        let err = Query::Boolean(Box::new(bq)).rewrite(4).unwrap_err();
        assert!(matches!(err, Error::TooManyClauses { limit: 4 }));
    }
}
