//! Mnemonic verification quiz
//!
//! After a new phrase is shown, the user proves they wrote it down by picking three words
//! by position from a shuffled pool of phrase words and decoys.

use rand::seq::{index, SliceRandom};
use rand::Rng;
use std::collections::HashSet;

use crate::error::{Result, VaultError};
use crate::wallet::mnemonic::english_word_list;

/// Number of positions the user has to confirm
pub const VERIFY_COUNT: usize = 3;
/// Upper bound on words shown at once
pub const MAX_POOL_SIZE: usize = 18;

/// Result of one selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizOutcome {
    /// Correct; the quiz moved on to the next position
    Advanced,
    /// Wrong word; same position again
    Mismatch,
    /// Correct selection at the last position (or the quiz was already done)
    Completed,
}

/// Verification state for one phrase
#[derive(Debug, Clone)]
pub struct MnemonicQuiz {
    words: Vec<String>,
    pool: Vec<String>,
    positions: Vec<usize>,
    step: usize,
    selected: Vec<String>,
    error: Option<String>,
}

impl MnemonicQuiz {
    pub fn new(phrase: &str) -> Result<Self> {
        Self::with_rng(phrase, &mut rand::thread_rng())
    }

    pub fn with_rng<R: Rng + ?Sized>(phrase: &str, rng: &mut R) -> Result<Self> {
        let words: Vec<String> = phrase.split_whitespace().map(str::to_string).collect();
        if words.len() < VERIFY_COUNT {
            return Err(VaultError::ValidationFailed(format!(
                "A recovery phrase needs at least {} words.",
                VERIFY_COUNT
            )));
        }

        let mut positions = index::sample(rng, words.len(), VERIFY_COUNT).into_vec();
        positions.sort_unstable();

        let pool = build_pool(&words, &positions, rng);

        Ok(Self {
            words,
            pool,
            positions,
            step: 0,
            selected: Vec::with_capacity(VERIFY_COUNT),
            error: None,
        })
    }

    /// Shuffled words to choose from
    pub fn pool(&self) -> &[String] {
        &self.pool
    }

    /// Zero-based phrase positions being verified, ascending
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    pub fn current_step(&self) -> usize {
        self.step
    }

    /// One-based position the user is asked for, `None` once complete
    pub fn prompt_position(&self) -> Option<usize> {
        self.positions.get(self.step).map(|p| p + 1)
    }

    /// Words confirmed so far, in step order
    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_complete(&self) -> bool {
        self.step >= self.positions.len()
    }

    pub fn select(&mut self, word: &str) -> QuizOutcome {
        if self.is_complete() {
            return QuizOutcome::Completed;
        }

        self.error = None;
        let target = &self.words[self.positions[self.step]];

        if word != target {
            self.error = Some("Wrong word selected. Please try again.".to_string());
            return QuizOutcome::Mismatch;
        }

        self.selected.push(word.to_string());
        self.step += 1;

        if self.is_complete() {
            tracing::debug!("mnemonic verification completed");
            QuizOutcome::Completed
        } else {
            QuizOutcome::Advanced
        }
    }
}

fn build_pool<R: Rng + ?Sized>(words: &[String], positions: &[usize], rng: &mut R) -> Vec<String> {
    let mut pool: Vec<String> = if words.len() <= MAX_POOL_SIZE {
        let in_phrase: HashSet<&str> = words.iter().map(String::as_str).collect();
        let decoys: Vec<&str> = english_word_list()
            .iter()
            .copied()
            .filter(|w| !in_phrase.contains(w))
            .collect();

        let mut pool = words.to_vec();
        pool.extend(
            decoys
                .choose_multiple(rng, MAX_POOL_SIZE - words.len())
                .map(|w| w.to_string()),
        );
        pool
    } else {
        // Long phrase: targets plus a sample of the remaining words
        let others: Vec<&String> = words
            .iter()
            .enumerate()
            .filter(|(i, _)| !positions.contains(i))
            .map(|(_, w)| w)
            .collect();

        let mut pool: Vec<String> = positions.iter().map(|&p| words[p].clone()).collect();
        pool.extend(
            others
                .choose_multiple(rng, MAX_POOL_SIZE - positions.len())
                .map(|w| (*w).clone()),
        );
        pool
    };

    pool.shuffle(rng);
    pool
}
