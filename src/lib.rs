//! Fast-path matching for fixed-width regular expressions.
//!
//! Most regex engines scan the whole input even when the pattern can
//! only ever match a handful of bytes at a known position.  This crate
//! recognises a sublanguage of patterns whose match width is fixed at
//! compile time (`x.xy$`, `^abc`, `a{3}b`, `jpg|png`) and compiles them
//! into small linear match programs that answer "does it match" with a
//! few byte comparisons instead of a full scan.
//!
//! # Architecture
//!
//! The pipeline is:
//!
//! ```text
//! regex_syntax::hir::Hir  ──compile──>  Option<Program>  ──matches──>  bool
//! ```
//!
//! [`compile`] walks the parsed HIR once and produces one of a small
//! closed set of program shapes:
//!
//! - [`Program::Anchored`]: every step sits at a known rune offset from
//!   the start or end of the input (`^a.b`, `a.b$`, `^a.b$`).
//! - [`Program::Unanchored`]: fixed width but free position; matched
//!   with indexed literal search and single-rune restarts (`a.b`).
//! - [`Program::Alternate`]: a top-level alternation of supported
//!   branches, first match wins (`jpg|png`).
//! - [`Program::FirstPass`]: a fixed-width `^`-prefix and/or `$`-suffix
//!   peeled off a more complex pattern; the trimmed middle is delegated
//!   to a compiled remainder regex (`^aa.*bb$`).
//! - [`Program::Unmatchable`]: compile-time contradictions such as
//!   `a$a` that can never match any input.
//!
//! Anything else (captures, `*`/`+`/`?`, word boundaries, line anchors,
//! nested alternations) makes [`compile`] return `None` and the caller
//! should use its general engine instead.  [`Regex`] bundles exactly
//! that arrangement, falling back to the `regex` crate.
//!
//! A compiled [`Program`] is immutable, allocates nothing on the match
//! path, and may be shared freely: any number of threads can call
//! [`Program::matches`] on the same program concurrently.

use std::fmt;
use std::mem;
use std::slice;
use std::str;

use memchr::memmem;
use regex_syntax::hir::{self, HirKind, Look};

/// Re-export so users do not need a direct `regex-syntax` dependency.
pub use regex_syntax::hir::Hir;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// An error returned when a pattern cannot be compiled at all.
///
/// Patterns that are merely outside the fast-path subset are not errors;
/// they compile to a `None` program and run on the fallback engine.
#[derive(Debug)]
pub enum Error {
    /// The pattern is not valid regex syntax.
    Syntax(regex_syntax::Error),
    /// The fallback engine refused the pattern (e.g. its compiled form
    /// exceeds the engine's size limit).
    Fallback(regex::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax(err) => write!(f, "invalid pattern: {}", err),
            Self::Fallback(err) => write!(f, "fallback engine rejected pattern: {}", err),
        }
    }
}

impl std::error::Error for Error {}

impl From<regex_syntax::Error> for Error {
    fn from(err: regex_syntax::Error) -> Self {
        Self::Syntax(err)
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Self::Fallback(err)
    }
}

/// Marker returned by the tree walker when the HIR contains a construct
/// outside the fixed-width subset.  Not an error: the caller either
/// tries prefix/suffix extraction or falls back to the general engine.
#[derive(Clone, Copy, Debug)]
struct Unsupported;

// ---------------------------------------------------------------------------
// Rune width helpers
// ---------------------------------------------------------------------------

/// Byte length of the first `n` runes of `s`.  If `s` has fewer than
/// `n` runes, the length of all of `s` is returned.
#[inline]
fn leading_width(s: &str, n: usize) -> usize {
    match s.char_indices().nth(n) {
        Some((idx, _)) => idx,
        None => s.len(),
    }
}

/// Byte length of the last `n` runes of `s`, or `None` if `s` has
/// fewer than `n` runes.
#[inline]
fn trailing_width(s: &str, n: usize) -> Option<usize> {
    if n == 0 {
        return Some(0);
    }
    s.char_indices()
        .rev()
        .nth(n - 1)
        .map(|(idx, _)| s.len() - idx)
}

// ---------------------------------------------------------------------------
// Step model
// ---------------------------------------------------------------------------

/// What a single [`Step`] matches.
#[derive(Debug)]
enum StepKind {
    /// Contiguous literal text, possibly several runes long.
    Literal(String),
    /// A set of inclusive rune ranges; one rune wide.
    Ranges(Box<[(char, char)]>),
    /// Any rune except one; one rune wide.  `.` and `[^x]` compile to
    /// this.
    NotChar(char),
    /// Any rune at all; one rune wide.  `(?s).` compiles to this.
    AnyChar,
}

/// One atomic unit of a linear program, with its width metadata.
#[derive(Debug)]
struct Step {
    kind: StepKind,
    /// Number of runes this step consumes.
    runes: usize,
    /// Minimum UTF-8 width of those runes, in bytes.
    min_width: usize,
    /// Maximum UTF-8 width, or `None` when a matching rune may be
    /// arbitrarily wide.
    max_width: Option<usize>,
    /// Total rune count of all steps before this one.  Set by the
    /// width pass.
    runes_before: usize,
    /// Minimum bytes needed from this step to the end of the program.
    /// Set by the width pass.
    min_tail_width: usize,
    /// Rune offset of this step from one end of the input: `Some(n)`
    /// with `n >= 0` counts from the start, `n < 0` counts from the end
    /// (`-k` means "the last `k` runes").  `None` in unanchored
    /// programs.
    anchor: Option<isize>,
}

impl Step {
    fn new(kind: StepKind, runes: usize, min_width: usize, max_width: Option<usize>) -> Step {
        Step {
            kind,
            runes,
            min_width,
            max_width,
            runes_before: 0,
            min_tail_width: 0,
            anchor: None,
        }
    }

    fn literal(text: &str) -> Step {
        Step::new(
            StepKind::Literal(text.to_owned()),
            text.chars().count(),
            text.len(),
            Some(text.len()),
        )
    }

    fn ranges(ranges: Box<[(char, char)]>) -> Step {
        Step::new(StepKind::Ranges(ranges), 1, 1, None)
    }

    fn not_char(excluded: char) -> Step {
        Step::new(StepKind::NotChar(excluded), 1, 1, None)
    }

    fn any_char() -> Step {
        Step::new(StepKind::AnyChar, 1, 1, None)
    }

    /// Match a slice that was cut to exactly this step's rune count.
    /// Used by the anchored runner only.
    fn matches_slice(&self, t: &str) -> bool {
        match &self.kind {
            StepKind::Literal(lit) => t == lit,
            StepKind::Ranges(ranges) => match t.chars().next() {
                Some(c) => in_ranges(ranges, c),
                None => false,
            },
            StepKind::NotChar(excluded) => match t.chars().next() {
                Some(c) => c != *excluded,
                None => false,
            },
            StepKind::AnyChar => true,
        }
    }
}

#[inline]
fn in_ranges(ranges: &[(char, char)], c: char) -> bool {
    ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi)
}

/// Lower a Unicode class to the narrowest step kind that covers it.
///
/// The translator has no dedicated "any char" node: `(?s).` arrives as
/// a class spanning every scalar value, and `.`/`[^x]` as two ranges
/// with a one-rune hole.
fn step_for_class(ranges: &[hir::ClassUnicodeRange]) -> Step {
    if let [full] = ranges {
        if full.start() == '\0' && full.end() == char::MAX {
            return Step::any_char();
        }
    }
    if let [lo, hi] = ranges {
        if lo.start() == '\0' && hi.end() == char::MAX && lo.end() as u32 + 2 == hi.start() as u32
        {
            // The hole straddling the surrogate gap is not a single
            // excluded rune; leave that shape to the range list.
            if let Some(excluded) = char::from_u32(lo.end() as u32 + 1) {
                return Step::not_char(excluded);
            }
        }
    }
    Step::ranges(ranges.iter().map(|r| (r.start(), r.end())).collect())
}

// ---------------------------------------------------------------------------
// Linear program: walker and width pass
// ---------------------------------------------------------------------------

/// A flat sequence of steps with no branching: the shape behind both
/// the anchored and the unanchored program variants and the first-pass
/// prefix/suffix pieces.
#[derive(Debug, Default)]
pub struct LinearProgram {
    steps: Vec<Step>,
    anchored_begin: bool,
    anchored_end: bool,
    /// Set when compilation proves no input can ever match (`a$a`).
    unmatchable: bool,
    /// Number of runes a match consumes.
    runes: usize,
    /// Minimum match width in bytes.
    min_width: usize,
    /// Maximum match width in bytes, `None` if unbounded per rune.
    max_width: Option<usize>,
}

impl LinearProgram {
    /// Walk one HIR node, appending to the step list.  `Err` means the
    /// node is outside the fixed-width subset; the program may be left
    /// with a partially-walked tail, which callers discard or truncate.
    fn push(&mut self, hir: &Hir) -> Result<(), Unsupported> {
        match hir.kind() {
            HirKind::Concat(children) => {
                for child in children {
                    self.push(child)?;
                }
                Ok(())
            }
            HirKind::Repetition(rep) => {
                // Only fixed-count repetitions keep the width static.
                if rep.max != Some(rep.min) {
                    return Err(Unsupported);
                }
                for _ in 0..rep.min {
                    self.push(&rep.sub)?;
                }
                Ok(())
            }
            HirKind::Literal(lit) => {
                let text = str::from_utf8(&lit.0).map_err(|_| Unsupported)?;
                // Adjacent literals (e.g. from an unrolled repetition)
                // fold into one searchable unit.
                if !self.anchored_end {
                    if let Some(step) = self.steps.last_mut() {
                        if let StepKind::Literal(prev) = &mut step.kind {
                            prev.push_str(text);
                            let runes = text.chars().count();
                            step.runes += runes;
                            step.min_width += text.len();
                            step.max_width = Some(step.min_width);
                            self.runes += runes;
                            return Ok(());
                        }
                    }
                }
                self.emit(Step::literal(text));
                Ok(())
            }
            HirKind::Class(hir::Class::Unicode(class)) => {
                if class.ranges().is_empty() {
                    // An empty class matches nothing at all.
                    self.unmatchable = true;
                    return Ok(());
                }
                self.emit(step_for_class(class.ranges()));
                Ok(())
            }
            // Byte-oriented classes only appear when the pattern was
            // translated without UTF-8 guarantees; stay out of that.
            HirKind::Class(hir::Class::Bytes(_)) => Err(Unsupported),
            HirKind::Look(Look::Start) => {
                if self.runes > 0 {
                    // Content before `^` (as in `a^`): no input can
                    // satisfy it.
                    self.unmatchable = true;
                } else {
                    self.anchored_begin = true;
                }
                Ok(())
            }
            HirKind::Look(Look::End) => {
                self.anchored_end = true;
                if !self.anchored_begin {
                    // Pin every accumulated step to its rune offset
                    // from the end of the input.
                    let mut offset = 0isize;
                    for step in self.steps.iter_mut().rev() {
                        offset -= step.runes as isize;
                        step.anchor = Some(offset);
                    }
                }
                Ok(())
            }
            // Everything else: line anchors, word boundaries, captures,
            // alternations below the root, empty matches.  The general
            // engine handles them.
            _ => Err(Unsupported),
        }
    }

    /// Append a content step, assigning its start-relative anchor when
    /// the program is begin-anchored.
    fn emit(&mut self, mut step: Step) {
        if self.anchored_end {
            // Content after `$` (as in `$a`): no input can satisfy it.
            self.unmatchable = true;
            return;
        }
        if self.anchored_begin {
            step.anchor = Some(self.runes as isize);
        }
        self.runes += step.runes;
        self.steps.push(step);
    }

    /// Recompute aggregate and per-step width metadata once the step
    /// list is final.
    fn compute_widths(&mut self) {
        self.runes = 0;
        self.min_width = 0;
        self.max_width = Some(0);
        for step in &mut self.steps {
            step.runes_before = self.runes;
            self.runes += step.runes;
            self.min_width += step.min_width;
            self.max_width = match (self.max_width, step.max_width) {
                (Some(total), Some(width)) => Some(total + width),
                _ => None,
            };
        }
        let mut tail = self.min_width;
        for step in &mut self.steps {
            step.min_tail_width = tail;
            tail -= step.min_width;
        }
    }

    /// Heap bytes owned by this program; the inline struct size is the
    /// caller's to account.
    fn heap_size(&self) -> usize {
        self.steps.len() * mem::size_of::<Step>()
            + self
                .steps
                .iter()
                .map(|step| match &step.kind {
                    StepKind::Literal(lit) => lit.len(),
                    StepKind::Ranges(ranges) => ranges.len() * mem::size_of::<(char, char)>(),
                    StepKind::NotChar(_) | StepKind::AnyChar => 0,
                })
                .sum::<usize>()
    }
}

// ---------------------------------------------------------------------------
// Linear program: anchored runner
// ---------------------------------------------------------------------------

impl LinearProgram {
    /// Match `s` when every step carries an anchor offset.  Work is
    /// proportional to the pattern width, not the input length.
    fn run_anchored(&self, s: &str) -> bool {
        if self.unmatchable {
            return false;
        }
        if s.len() < self.min_width {
            return false;
        }
        // For exact shapes like `^aa$` the byte length is known ahead.
        if self.anchored_begin && self.anchored_end {
            if let Some(max_width) = self.max_width {
                if s.len() > max_width {
                    return false;
                }
            }
        }

        let mut begin = 0;
        for step in &self.steps {
            // There are no zero-rune steps.
            if begin >= s.len() {
                return false;
            }
            match step.anchor {
                Some(offset) if offset >= 0 => {
                    debug_assert_eq!(offset as usize, step.runes_before);
                    let anchor_width = leading_width(s, offset as usize);
                    if anchor_width < begin {
                        // Two steps would overlap.
                        return false;
                    }
                    begin = anchor_width;
                }
                Some(offset) => {
                    debug_assert_eq!(offset, step.runes_before as isize - self.runes as isize);
                    match trailing_width(s, offset.unsigned_abs()) {
                        Some(anchor_width) => begin = s.len() - anchor_width,
                        None => return false,
                    }
                }
                None => {
                    debug_assert!(false, "anchored program with an unanchored step");
                    return false;
                }
            }
            let end = begin + leading_width(&s[begin..], step.runes);
            if !step.matches_slice(&s[begin..end]) {
                return false;
            }
            begin = end;
        }

        // A trailing `$` requires the last step to end flush with the
        // input; a bare `$` with no steps matches anywhere.
        if self.anchored_end && !self.steps.is_empty() && begin != s.len() {
            return false;
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Linear program: unanchored runner
// ---------------------------------------------------------------------------

impl LinearProgram {
    /// Match `s` with no anchors: slide a match attempt through the
    /// input, driven by indexed literal search.
    ///
    /// `cursor` is where the current attempt started; `begin` is where
    /// the next step is tested.  When a step past the first one fails,
    /// the attempt restarts from one rune after `cursor`.  Restarting
    /// from `begin` instead would skip starts that overlap the failed
    /// attempt and lose matches like `x.y` against `xxy`.
    fn run_unanchored(&self, s: &str) -> bool {
        debug_assert!(!self.anchored_begin && !self.anchored_end && !self.unmatchable);
        let mut cursor = 0;
        'attempt: loop {
            let mut begin = cursor;
            for (i, step) in self.steps.iter().enumerate() {
                // Not enough input left for this step and everything
                // after it.
                if begin + step.min_tail_width > s.len() {
                    return false;
                }
                match &step.kind {
                    StepKind::Literal(lit) => {
                        match memmem::find(&s.as_bytes()[begin..], lit.as_bytes()) {
                            None => return false,
                            Some(0) => begin += lit.len(),
                            Some(found) if i == 0 => {
                                // First step: slide the attempt to the
                                // occurrence.  A UTF-8 hit always sits
                                // on a rune boundary.
                                cursor = begin + found;
                                begin = cursor + lit.len();
                            }
                            Some(_) => {
                                cursor += leading_width(&s[cursor..], 1);
                                continue 'attempt;
                            }
                        }
                    }
                    StepKind::NotChar(excluded) => {
                        // The width guard above leaves at least one rune.
                        let c = s[begin..].chars().next().unwrap();
                        if c != *excluded {
                            begin += c.len_utf8();
                        } else if i == 0 {
                            match s[begin..].char_indices().find(|&(_, c)| c != *excluded) {
                                None => return false,
                                Some((found, c)) => {
                                    cursor = begin + found;
                                    begin = cursor + c.len_utf8();
                                }
                            }
                        } else {
                            cursor += leading_width(&s[cursor..], 1);
                            continue 'attempt;
                        }
                    }
                    StepKind::Ranges(ranges) => {
                        let c = s[begin..].chars().next().unwrap();
                        if in_ranges(ranges, c) {
                            begin += c.len_utf8();
                        } else if i == 0 {
                            match s[begin..].char_indices().find(|&(_, c)| in_ranges(ranges, c)) {
                                None => return false,
                                Some((found, c)) => {
                                    cursor = begin + found;
                                    begin = cursor + c.len_utf8();
                                }
                            }
                        } else {
                            cursor += leading_width(&s[cursor..], 1);
                            continue 'attempt;
                        }
                    }
                    StepKind::AnyChar => {
                        begin += leading_width(&s[begin..], 1);
                    }
                }
            }
            return true;
        }
    }
}

// ---------------------------------------------------------------------------
// First-pass program
// ---------------------------------------------------------------------------

/// A fixed-width `^`-prefix and/or `$`-suffix peeled off a pattern that
/// is otherwise too rich for a linear program.  The prefix and suffix
/// are tested first; only then does the (general-engine) remainder see
/// the trimmed middle.
#[derive(Debug)]
pub struct FirstPassProgram {
    prefix: Option<LinearProgram>,
    suffix: Option<LinearProgram>,
    remainder: regex::Regex,
}

impl FirstPassProgram {
    fn matches(&self, s: &str) -> bool {
        let mut s = s;
        if let Some(prefix) = &self.prefix {
            if !prefix.run_anchored(s) {
                return false;
            }
            s = &s[leading_width(s, prefix.runes)..];
        }
        if let Some(suffix) = &self.suffix {
            if !suffix.run_anchored(s) {
                return false;
            }
            // The suffix just matched, so at least `suffix.runes` runes
            // remain.
            let width = trailing_width(s, suffix.runes).unwrap();
            s = &s[..s.len() - width];
        }
        self.remainder.is_match(s)
    }

    fn heap_size(&self) -> usize {
        self.prefix.as_ref().map_or(0, LinearProgram::heap_size)
            + self.suffix.as_ref().map_or(0, LinearProgram::heap_size)
    }
}

// ---------------------------------------------------------------------------
// Program dispatch
// ---------------------------------------------------------------------------

/// A compiled fast-path program.
///
/// Built once by [`compile`], immutable afterwards.  [`matches`]
/// allocates nothing and keeps no state between calls, so one program
/// can serve any number of threads at once.
///
/// [`matches`]: Program::matches
#[derive(Debug)]
pub enum Program {
    /// Fixed width, `^` and/or `$`: every step sits at a known rune
    /// offset from one end of the input.
    Anchored(LinearProgram),
    /// Fixed width, free position.
    Unanchored(LinearProgram),
    /// Top-level alternation; branches run in order, first match wins.
    Alternate(Vec<Program>),
    /// Fixed-width prefix/suffix around a general-engine middle.
    FirstPass(FirstPassProgram),
    /// Provably never matches.
    Unmatchable,
}

impl Program {
    /// Whether `s` matches the compiled pattern anywhere.
    pub fn matches(&self, s: &str) -> bool {
        match self {
            Program::Anchored(prog) => prog.run_anchored(s),
            Program::Unanchored(prog) => prog.run_unanchored(s),
            Program::Alternate(progs) => progs.iter().any(|prog| prog.matches(s)),
            Program::FirstPass(first_pass) => first_pass.matches(s),
            Program::Unmatchable => false,
        }
    }

    /// Total memory footprint of this program in bytes, inline plus
    /// owned heap.  The remainder engine of a first-pass program keeps
    /// its internal allocations to itself and is counted at struct
    /// size only.
    pub fn memory_size(&self) -> usize {
        mem::size_of::<Self>() + self.heap_size()
    }

    fn heap_size(&self) -> usize {
        match self {
            Program::Anchored(prog) | Program::Unanchored(prog) => prog.heap_size(),
            Program::Alternate(progs) => {
                progs.len() * mem::size_of::<Program>()
                    + progs.iter().map(Program::heap_size).sum::<usize>()
            }
            Program::FirstPass(first_pass) => first_pass.heap_size(),
            Program::Unmatchable => 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Compiler
// ---------------------------------------------------------------------------

/// Analyse a parsed pattern and build a fast-path program for it, or
/// `None` when the pattern falls outside the supported subset and a
/// general engine should take over.
///
/// The input tree is only read, never kept: the returned program owns
/// everything it needs.
pub fn compile(hir: &Hir) -> Option<Program> {
    // A top-level alternation becomes one sub-program per branch, and
    // every branch must itself be supported.
    if let HirKind::Alternation(branches) = hir.kind() {
        let progs = branches.iter().map(compile).collect::<Option<Vec<_>>>()?;
        return Some(Program::Alternate(progs));
    }

    let mut linear = LinearProgram::default();
    if linear.push(hir).is_err() {
        // A fixed-width prefix or suffix may still be peeled off a
        // top-level concatenation.
        if let HirKind::Concat(children) = hir.kind() {
            if children.len() > 1 {
                if let Some(first_pass) = extract_first_pass(children) {
                    return Some(Program::FirstPass(first_pass));
                }
            }
        }
        return None;
    }

    if linear.unmatchable {
        return Some(Program::Unmatchable);
    }

    linear.compute_widths();
    if linear.anchored_begin || linear.anchored_end {
        Some(Program::Anchored(linear))
    } else {
        Some(Program::Unanchored(linear))
    }
}

/// Whether a look-around's meaning depends on where the input begins.
/// Word boundaries qualify: stripping a prefix changes the character to
/// the left of the cut.
fn depends_on_start(look: Look) -> bool {
    !matches!(look, Look::End | Look::EndLF | Look::EndCRLF)
}

/// Whether a look-around's meaning depends on where the input ends.
fn depends_on_end(look: Look) -> bool {
    !matches!(look, Look::Start | Look::StartLF | Look::StartCRLF)
}

/// Recursively scan `hirs` for a look-around that `invalidates` deems
/// unsafe to keep across a trim.
fn contains_look(hirs: &[Hir], invalidates: fn(Look) -> bool) -> bool {
    hirs.iter().any(|hir| match hir.kind() {
        HirKind::Look(look) => invalidates(*look),
        HirKind::Repetition(rep) => contains_look(slice::from_ref(&rep.sub), invalidates),
        HirKind::Capture(cap) => contains_look(slice::from_ref(&cap.sub), invalidates),
        HirKind::Concat(subs) | HirKind::Alternation(subs) => contains_look(subs, invalidates),
        _ => false,
    })
}

/// Try to peel a fixed-width prefix and/or suffix off a top-level
/// concatenation whose full walk bailed out.
///
/// The suffix pass runs on whatever the prefix pass left over, so when
/// both succeed the remainder reflects both trims.
fn extract_first_pass(children: &[Hir]) -> Option<FirstPassProgram> {
    let mut prefix = None;
    let mut remainder: Vec<Hir> = children.to_vec();

    if let Some((prog, rest)) = extract_prefix(&remainder) {
        prefix = Some(prog);
        remainder = rest;
    }
    let mut suffix = None;
    if let Some((prog, rest)) = extract_suffix(&remainder) {
        suffix = Some(prog);
        remainder = rest;
    }
    if prefix.is_none() && suffix.is_none() {
        return None;
    }

    // The pattern as a whole compiled before we were asked to split it,
    // so the remainder must compile too.
    let remainder = regex::Regex::new(&Hir::concat(remainder).to_string())
        .expect("remainder of an already-valid pattern must compile");
    Some(FirstPassProgram {
        prefix,
        suffix,
        remainder,
    })
}

/// Peel `^` plus the longest run of fixed-width children off the front
/// of a concatenation.  Returns the prefix program and the remaining
/// children (with the `^` re-attached) on success.
fn extract_prefix(children: &[Hir]) -> Option<(LinearProgram, Vec<Hir>)> {
    if !matches!(children[0].kind(), HirKind::Look(Look::Start)) {
        return None;
    }

    // Find how many leading children walk cleanly.  The walk of the
    // breaking child may have appended or merged part of itself, so the
    // trial program is thrown away and the prefix rebuilt from whole
    // children only.
    let mut taken = 0;
    let mut trial = LinearProgram::default();
    for child in children {
        if trial.push(child).is_err() {
            break;
        }
        taken += 1;
    }

    // Need the `^` plus at least one whole fixed-width child carrying a
    // real step.
    if taken < 2 {
        return None;
    }
    // An assertion in the remainder that cares about the input start
    // would change meaning once the prefix text is stripped.
    if contains_look(&children[taken..], depends_on_start) {
        return None;
    }

    let mut prog = LinearProgram::default();
    for child in &children[..taken] {
        // Already walked cleanly once.
        if prog.push(child).is_err() {
            unreachable!("prefix child failed to walk a second time");
        }
    }
    if prog.steps.is_empty() {
        return None;
    }
    prog.compute_widths();

    let mut rest = Vec::with_capacity(children.len() - taken + 1);
    rest.push(children[0].clone());
    rest.extend(children[taken..].iter().cloned());
    Some((prog, rest))
}

/// Peel the longest unbroken run of fixed-width children ending at `$`
/// off the back of a concatenation.  Returns the suffix program and the
/// remaining children (with the `$` re-attached) on success.
fn extract_suffix(children: &[Hir]) -> Option<(LinearProgram, Vec<Hir>)> {
    if children.len() < 2
        || !matches!(children[children.len() - 1].kind(), HirKind::Look(Look::End))
    {
        return None;
    }

    let mut prog = LinearProgram::default();
    let mut last_invalid = 0;
    for (i, child) in children.iter().enumerate() {
        if prog.push(child).is_err() {
            // The suffix must be an unbroken run; start over past this
            // child.
            prog = LinearProgram::default();
            last_invalid = i;
        }
    }

    if prog.steps.is_empty() || last_invalid >= children.len() - 1 {
        return None;
    }
    // An assertion in the head that cares about the input end would
    // change meaning once the suffix text is stripped.
    if contains_look(&children[..=last_invalid], depends_on_end) {
        return None;
    }

    prog.compute_widths();

    let mut rest: Vec<Hir> = children[..=last_invalid].to_vec();
    rest.push(children[children.len() - 1].clone());
    Some((prog, rest))
}

// ---------------------------------------------------------------------------
// Public wrapper
// ---------------------------------------------------------------------------

/// A compiled pattern: the fast-path program when one applies, with the
/// `regex` crate as the general fallback.
#[derive(Debug)]
pub struct Regex {
    program: Option<Program>,
    general: regex::Regex,
}

impl Regex {
    /// Compile `pattern`, analysing it for a fast-path program.
    pub fn new(pattern: &str) -> Result<Regex, Error> {
        let hir = regex_syntax::Parser::new().parse(pattern)?;
        let general = regex::Regex::new(pattern)?;
        Ok(Regex {
            program: compile(&hir),
            general,
        })
    }

    /// Whether `s` matches anywhere, preferring the fast path.
    pub fn is_match(&self, s: &str) -> bool {
        match &self.program {
            Some(program) => program.matches(s),
            None => self.general.is_match(s),
        }
    }

    /// The fast-path program this pattern compiled to, if any.
    pub fn bypass(&self) -> Option<&Program> {
        self.program.as_ref()
    }

    /// The original pattern string.
    pub fn as_str(&self) -> &str {
        self.general.as_str()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
