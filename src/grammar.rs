//! Grammar engine: letters, words, production rules and multi-generation derivation.
//!
//! A [`Grammar`] owns an axiom and a [`RuleSet`]. Calling [`Grammar::derive`]
//! rewrites the axiom `depth` times and returns every intermediate word, so
//! `derive(0)` is just `[axiom]`. Letters without a rule pass through unchanged.

use crate::error::{LsysError, Result};
use glam::Vec2;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tracing::debug;

/// The set of symbols a grammar may use. Ordered so enumeration is stable.
pub type Alphabet = BTreeSet<String>;

/// Orientation of an edge letter in edge-rewriting systems (FASS curves).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    /// `Fl`
    Left,
    /// `Fr`
    Right,
}

/// An attachment point of a node letter: where it sits and which way it faces.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub point: Vec2,
    pub direction: Vec2,
}

/// One atomic symbol of a word.
///
/// Rules and the interpreter both key on [`Letter::symbol`]; the variant only
/// decides what extra data travels with the symbol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Letter {
    /// A plain token such as `F`, `+` or `[`.
    Symbol(String),
    /// A drawn edge with a handedness. Rendered like `F`.
    Edge { symbol: String, kind: EdgeKind },
    /// A structural node with entry/exit ports. Carries no turtle geometry.
    Node {
        symbol: String,
        entry: Port,
        exit: Port,
        frame: String,
    },
}

impl Letter {
    /// Builds a letter from a token, recognising the `Fl`/`Fr` edge pair.
    pub fn parse(token: &str) -> Self {
        match token {
            "Fl" => Letter::Edge {
                symbol: token.to_string(),
                kind: EdgeKind::Left,
            },
            "Fr" => Letter::Edge {
                symbol: token.to_string(),
                kind: EdgeKind::Right,
            },
            _ => Letter::Symbol(token.to_string()),
        }
    }

    /// The token this letter was written as.
    pub fn symbol(&self) -> &str {
        match self {
            Letter::Symbol(s) => s,
            Letter::Edge { symbol, .. } | Letter::Node { symbol, .. } => symbol,
        }
    }
}

impl From<&str> for Letter {
    fn from(token: &str) -> Self {
        Letter::parse(token)
    }
}

impl fmt::Display for Letter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// An ordered sequence of letters, read left to right by the interpreter.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Word(Vec<Letter>);

impl Word {
    /// An empty word.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokenizes `text` by longest match against `alphabet`.
    ///
    /// Multi-character symbols (e.g. `Fl`) are only recognised when they are
    /// in the alphabet; anything else becomes a single-character letter.
    /// Whitespace is skipped.
    pub fn parse(text: &str, alphabet: &Alphabet) -> Self {
        let longest = alphabet
            .iter()
            .map(|s| s.chars().count())
            .max()
            .unwrap_or(1);
        let mut letters = Vec::new();
        let mut rest = text;

        while let Some(first) = rest.chars().next() {
            if first.is_whitespace() {
                rest = &rest[first.len_utf8()..];
                continue;
            }

            let mut taken = first.len_utf8();
            for n in (2..=longest).rev() {
                if let Some(end) = prefix_bytes(rest, n)
                    && alphabet.contains(&rest[..end])
                {
                    taken = end;
                    break;
                }
            }

            letters.push(Letter::parse(&rest[..taken]));
            rest = &rest[taken..];
        }

        Word(letters)
    }

    /// The letters in reading order.
    pub fn letters(&self) -> &[Letter] {
        &self.0
    }

    /// Iterates over the letters left to right.
    pub fn iter(&self) -> std::slice::Iter<'_, Letter> {
        self.0.iter()
    }

    /// Number of letters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the empty word.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Appends a letter.
    pub fn push(&mut self, letter: Letter) {
        self.0.push(letter);
    }

    /// Number of letters whose symbol equals `symbol`.
    pub fn count(&self, symbol: &str) -> usize {
        self.0.iter().filter(|l| l.symbol() == symbol).count()
    }
}

/// Byte length of the first `chars` characters, if `s` has that many.
fn prefix_bytes(s: &str, chars: usize) -> Option<usize> {
    match s.char_indices().nth(chars) {
        Some((end, _)) => Some(end),
        None if s.chars().count() == chars => Some(s.len()),
        None => None,
    }
}

/// Multi-character tokens that [`Letter::parse`] turns into edge letters.
const EDGE_TOKENS: [&str; 2] = ["Fl", "Fr"];

/// Tokenizes with the edge tokens (`Fl`, `Fr`) as the only multi-character
/// symbols, so `Word::from("Fl")` agrees with `Letter::from("Fl")`.
impl From<&str> for Word {
    fn from(text: &str) -> Self {
        let edges: Alphabet = EDGE_TOKENS.iter().map(|s| s.to_string()).collect();
        Word::parse(text, &edges)
    }
}

impl FromIterator<Letter> for Word {
    fn from_iter<I: IntoIterator<Item = Letter>>(iter: I) -> Self {
        Word(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Word {
    type Item = &'a Letter;
    type IntoIter = std::slice::Iter<'a, Letter>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for letter in &self.0 {
            f.write_str(letter.symbol())?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
enum Successor {
    Fixed(Word),
    Weighted {
        options: Vec<Word>,
        probabilities: Vec<f64>,
        sampler: WeightedIndex<f64>,
    },
}

/// A single rewrite rule `predecessor -> successor`.
///
/// Stochastic rules hold several weighted successors; weights are normalized
/// internally so they only need to be non-negative with a positive sum.
#[derive(Clone, Debug)]
pub struct ProductionRule {
    predecessor: Letter,
    successor: Successor,
}

impl ProductionRule {
    /// Creates a deterministic rule.
    pub fn new(predecessor: impl Into<Letter>, successor: impl Into<Word>) -> Self {
        Self {
            predecessor: predecessor.into(),
            successor: Successor::Fixed(successor.into()),
        }
    }

    /// Creates a stochastic rule from `(successor, weight)` alternatives.
    ///
    /// Fails with [`LsysError::InvalidRule`] when the list is empty, a weight
    /// is negative or non-finite, or all weights are zero.
    pub fn stochastic(
        predecessor: impl Into<Letter>,
        alternatives: Vec<(Word, f64)>,
    ) -> Result<Self> {
        let predecessor = predecessor.into();
        let invalid = |reason: String| LsysError::InvalidRule {
            predecessor: predecessor.symbol().to_string(),
            reason,
        };

        if alternatives.is_empty() {
            return Err(invalid("no successors given".into()));
        }
        if let Some((_, w)) = alternatives
            .iter()
            .find(|(_, w)| !w.is_finite() || *w < 0.0)
        {
            return Err(invalid(format!("weight {w} is negative or not finite")));
        }
        let total: f64 = alternatives.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return Err(invalid("weights sum to zero".into()));
        }

        let (options, weights): (Vec<Word>, Vec<f64>) = alternatives.into_iter().unzip();
        let sampler = WeightedIndex::new(&weights).map_err(|e| invalid(e.to_string()))?;
        let probabilities = weights.iter().map(|w| w / total).collect();

        Ok(Self {
            predecessor,
            successor: Successor::Weighted {
                options,
                probabilities,
                sampler,
            },
        })
    }

    /// The letter this rule rewrites.
    pub fn predecessor(&self) -> &Letter {
        &self.predecessor
    }

    /// True if the rule has weighted alternatives.
    pub fn is_stochastic(&self) -> bool {
        matches!(self.successor, Successor::Weighted { .. })
    }

    /// Successors paired with their normalized probabilities.
    pub fn alternatives(&self) -> Vec<(&Word, f64)> {
        match &self.successor {
            Successor::Fixed(word) => vec![(word, 1.0)],
            Successor::Weighted {
                options,
                probabilities,
                ..
            } => options.iter().zip(probabilities.iter().copied()).collect(),
        }
    }

    /// Picks the successor for one occurrence of the predecessor.
    ///
    /// Deterministic rules never touch `rng`.
    pub fn generate_successor<R: Rng + ?Sized>(&self, rng: &mut R) -> &Word {
        match &self.successor {
            Successor::Fixed(word) => word,
            Successor::Weighted {
                options, sampler, ..
            } => &options[sampler.sample(rng)],
        }
    }
}

/// Ordered rules keyed by predecessor symbol. Duplicate predecessors are rejected.
#[derive(Clone, Debug, Default)]
pub struct RuleSet {
    rules: Vec<ProductionRule>,
    by_symbol: HashMap<String, usize>,
}

impl RuleSet {
    /// An empty rule set; every letter maps to itself.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a rule set, failing on the first duplicate predecessor.
    pub fn from_rules(rules: impl IntoIterator<Item = ProductionRule>) -> Result<Self> {
        let mut set = Self::new();
        for rule in rules {
            set.add(rule)?;
        }
        Ok(set)
    }

    /// Adds a rule. A second rule for the same predecessor is an
    /// [`LsysError::InvalidRule`].
    pub fn add(&mut self, rule: ProductionRule) -> Result<()> {
        let key = rule.predecessor.symbol().to_string();
        if self.by_symbol.contains_key(&key) {
            return Err(LsysError::InvalidRule {
                predecessor: key,
                reason: "duplicate predecessor".into(),
            });
        }
        self.by_symbol.insert(key, self.rules.len());
        self.rules.push(rule);
        Ok(())
    }

    /// The rule whose predecessor is `symbol`, if any.
    pub fn get(&self, symbol: &str) -> Option<&ProductionRule> {
        self.by_symbol.get(symbol).map(|&i| &self.rules[i])
    }

    /// Iterates over the rules in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, ProductionRule> {
        self.rules.iter()
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True if no rules are registered.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// True if any rule is stochastic.
    pub fn is_stochastic(&self) -> bool {
        self.rules.iter().any(ProductionRule::is_stochastic)
    }

    /// Rewrites every letter of `word` once.
    ///
    /// Matched letters expand in place to their (possibly sampled) successor;
    /// unmatched letters are copied through untouched.
    pub fn apply_to<R: Rng + ?Sized>(&self, word: &Word, rng: &mut R) -> Word {
        let mut next = Vec::with_capacity(word.len());
        for letter in word {
            match self.get(letter.symbol()) {
                Some(rule) => next.extend(rule.generate_successor(rng).iter().cloned()),
                None => next.push(letter.clone()),
            }
        }
        Word(next)
    }
}

/// How a grammar treats its declared alphabet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlphabetPolicy {
    /// Every axiom, predecessor and successor symbol must be declared.
    Strict,
    /// The alphabet is extended with every symbol the grammar uses.
    #[default]
    Inferred,
}

/// A context-free L-system (DOL-system, or stochastic when any rule is).
///
/// Immutable once built; derivation never touches the rules.
#[derive(Clone, Debug)]
pub struct Grammar {
    alphabet: Alphabet,
    axiom: Word,
    rules: RuleSet,
    policy: AlphabetPolicy,
    max_word_len: Option<usize>,
}

impl Grammar {
    /// Builds a grammar and validates it against `policy`.
    ///
    /// Under [`AlphabetPolicy::Strict`] any undeclared symbol fails with
    /// [`LsysError::UnknownSymbol`].
    pub fn new<S: Into<String>>(
        alphabet: impl IntoIterator<Item = S>,
        axiom: Word,
        rules: RuleSet,
        policy: AlphabetPolicy,
    ) -> Result<Self> {
        let alphabet: Alphabet = alphabet.into_iter().map(Into::into).collect();

        if policy == AlphabetPolicy::Inferred {
            return Ok(Self::with_inferred_alphabet(alphabet, axiom, rules));
        }

        if let Some((letter, context)) = used_letters(&axiom, &rules)
            .into_iter()
            .find(|(l, _)| !alphabet.contains(l.symbol()))
        {
            return Err(LsysError::UnknownSymbol {
                symbol: letter.symbol().to_string(),
                context,
            });
        }

        Ok(Self {
            alphabet,
            axiom,
            rules,
            policy,
            max_word_len: None,
        })
    }

    /// Builds a grammar whose alphabet is inferred from the axiom and rules.
    pub fn inferred(axiom: Word, rules: RuleSet) -> Self {
        Self::with_inferred_alphabet(Alphabet::new(), axiom, rules)
    }

    /// Shared by [`new`](Self::new) and [`inferred`](Self::inferred); cannot fail.
    fn with_inferred_alphabet(mut alphabet: Alphabet, axiom: Word, rules: RuleSet) -> Self {
        let extra: Vec<String> = used_letters(&axiom, &rules)
            .into_iter()
            .map(|(l, _)| l.symbol().to_string())
            .collect();
        alphabet.extend(extra);

        Self {
            alphabet,
            axiom,
            rules,
            policy: AlphabetPolicy::Inferred,
            max_word_len: None,
        }
    }

    /// Caps the length of every derived word (builder pattern).
    pub fn with_max_word_len(mut self, limit: usize) -> Self {
        self.max_word_len = Some(limit);
        self
    }

    /// Declared (or inferred) symbols.
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// The word at generation 0.
    pub fn axiom(&self) -> &Word {
        &self.axiom
    }

    /// The production rules.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// How the alphabet was validated at construction.
    pub fn policy(&self) -> AlphabetPolicy {
        self.policy
    }

    /// True if derivation consumes randomness.
    pub fn is_stochastic(&self) -> bool {
        self.rules.is_stochastic()
    }

    /// Tokenizes `text` against this grammar's alphabet.
    pub fn parse_word(&self, text: &str) -> Word {
        Word::parse(text, &self.alphabet)
    }

    /// Returns the derivation sequence `[axiom, w1, ..., w_depth]`.
    ///
    /// Stochastic choices are drawn from `rng` in letter order, so an
    /// identically seeded source reproduces the same sequence. If a word
    /// exceeds the length cap the whole derivation fails; no partial
    /// sequence is returned.
    pub fn derive<R: Rng + ?Sized>(&self, depth: usize, rng: &mut R) -> Result<Vec<Word>> {
        self.check_len(0, &self.axiom)?;
        let mut words = Vec::with_capacity(depth + 1);
        words.push(self.axiom.clone());

        for generation in 1..=depth {
            let next = match words.last() {
                Some(prev) => self.rules.apply_to(prev, rng),
                None => break,
            };
            self.check_len(generation, &next)?;
            debug!(generation, letters = next.len(), "derived word");
            words.push(next);
        }

        Ok(words)
    }

    /// [`derive`](Self::derive) with a fresh [`StdRng`] seeded from `seed`.
    pub fn derive_seeded(&self, depth: usize, seed: u64) -> Result<Vec<Word>> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.derive(depth, &mut rng)
    }

    /// The last word of the derivation sequence.
    pub fn final_word<R: Rng + ?Sized>(&self, depth: usize, rng: &mut R) -> Result<Word> {
        let mut words = self.derive(depth, rng)?;
        Ok(words.pop().unwrap_or_default())
    }

    fn check_len(&self, generation: usize, word: &Word) -> Result<()> {
        match self.max_word_len {
            Some(limit) if word.len() > limit => Err(LsysError::WordLimitExceeded {
                generation,
                length: word.len(),
                limit,
            }),
            _ => Ok(()),
        }
    }
}

/// Every letter an axiom and rule set can produce, with where it was found.
fn used_letters<'a>(axiom: &'a Word, rules: &'a RuleSet) -> Vec<(&'a Letter, String)> {
    let mut used: Vec<(&Letter, String)> = axiom.iter().map(|l| (l, "axiom".into())).collect();
    for rule in rules.iter() {
        let pred = rule.predecessor.symbol();
        used.push((&rule.predecessor, "rule predecessors".into()));
        for (word, _) in rule.alternatives() {
            used.extend(word.iter().map(|l| (l, format!("successor of `{pred}`"))));
        }
    }
    used
}

/// Every arrangement of distinct alphabet symbols of length `1..=max_len`.
///
/// Shorter words come first; within a length, order follows the alphabet's
/// sorted order position by position.
pub fn enumerate_words(alphabet: &Alphabet, max_len: usize) -> Vec<String> {
    let pool: Vec<&str> = alphabet.iter().map(String::as_str).collect();
    let mut out = Vec::new();
    let mut picked = Vec::new();
    for len in 1..=max_len.min(pool.len()) {
        arrange(&pool, len, &mut picked, &mut out);
    }
    out
}

fn arrange(pool: &[&str], len: usize, picked: &mut Vec<usize>, out: &mut Vec<String>) {
    if picked.len() == len {
        out.push(picked.iter().map(|&i| pool[i]).collect());
        return;
    }
    for i in 0..pool.len() {
        if picked.contains(&i) {
            continue;
        }
        picked.push(i);
        arrange(pool, len, picked, out);
        picked.pop();
    }
}
