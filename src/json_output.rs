//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per l'uso programmatico della CLI.
//!
//! ## Responsabilità:
//! - Emette un messaggio JSON per riga su stdout per ogni evento di consegna
//! - Fornisce interfaccia standardizzata per comunicazione inter-processo
//!
//! ## Tipi di messaggi:
//! - `start`: job accettato
//! - `progress`: messaggio di avanzamento per l'utente
//! - `delivered`: preview + link monetizzato consegnati
//! - `failed`: avviso di errore generico consegnato
//! - `summary`: conteggio finale dei job

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::job::JobId;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    /// Job accettato
    Start { job_id: JobId, source: String },

    /// Avanzamento
    Progress { job_id: JobId, text: String },

    /// Risultato consegnato
    Delivered {
        job_id: JobId,
        preview: PathBuf,
        caption: String,
        button_label: String,
        url: String,
    },

    /// Avviso di errore consegnato
    Failed { job_id: JobId, text: String },

    /// Riepilogo finale
    Summary {
        total: usize,
        delivered: usize,
        failed: usize,
        duration_seconds: f64,
    },
}

impl JsonMessage {
    /// Serialize to one line
    pub fn to_line(&self) -> String {
        // serializing these plain structs cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Print to stdout
    pub fn emit(&self) {
        println!("{}", self.to_line());
    }
}
