//! Line-oriented user interaction.
//!
//! The session only talks to the user through [`Console`], so tests drive it
//! with scripted input and the binary uses stdin/stdout.

use std::io::{self, BufRead, Write};
use strum::{Display, EnumString};

/// Line-based prompt/answer boundary
pub trait Console {
    /// Print the prompt and read one line; `Ok(None)` at end of input
    fn prompt(&mut self, text: &str) -> io::Result<Option<String>>;

    /// Print an informational line
    fn show(&mut self, text: &str) -> io::Result<()>;

    /// Print a diagnostic line
    fn report(&mut self, text: &str) -> io::Result<()>;
}

/// Console over any buffered reader and pair of writers
pub struct LineConsole<R, W, E> {
    input: R,
    output: W,
    errors: E,
}

impl LineConsole<io::StdinLock<'static>, io::Stdout, io::Stderr> {
    pub fn stdio() -> Self {
        LineConsole::new(io::stdin().lock(), io::stdout(), io::stderr())
    }
}

impl<R: BufRead, W: Write, E: Write> LineConsole<R, W, E> {
    pub fn new(input: R, output: W, errors: E) -> Self {
        LineConsole {
            input,
            output,
            errors,
        }
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn errors(&self) -> &E {
        &self.errors
    }
}

impl<R: BufRead, W: Write, E: Write> Console for LineConsole<R, W, E> {
    fn prompt(&mut self, text: &str) -> io::Result<Option<String>> {
        write!(self.output, "{}", text)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn show(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.output, "{}", text)
    }

    fn report(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.errors, "{}", text)
    }
}

/// True for answers starting with `y` or `Y`
pub fn is_yes(answer: &str) -> bool {
    answer
        .trim_start()
        .chars()
        .next()
        .is_some_and(|c| c.eq_ignore_ascii_case(&'y'))
}

/// Language of the prompt catalogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display)]
#[strum(ascii_case_insensitive)]
pub enum PromptLanguage {
    #[default]
    #[strum(serialize = "en", serialize = "english")]
    English,
    #[strum(serialize = "it", serialize = "italian")]
    Italian,
}

/// Texts shown by the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompts {
    pub menu: &'static str,
    pub menu_choice: &'static str,
    pub invalid_choice: &'static str,
    pub load_file_name: &'static str,
    pub load_file_failed: &'static str,
    pub table_name: &'static str,
    pub load_table_failed: &'static str,
    pub radius: &'static str,
    pub invalid_radius: &'static str,
    pub cluster_count: &'static str,
    pub clustering_failed: &'static str,
    pub save_question: &'static str,
    pub save_file_name: &'static str,
    pub saved: &'static str,
    pub save_failed: &'static str,
    pub repeat: &'static str,
    pub new_operation: &'static str,
    pub disconnected: &'static str,
}

impl Prompts {
    pub fn for_language(language: PromptLanguage) -> Self {
        match language {
            PromptLanguage::English => Self::english(),
            PromptLanguage::Italian => Self::italian(),
        }
    }

    pub fn english() -> Self {
        Prompts {
            menu: "\n(1) Load clusters from file\n(2) Load data from db",
            menu_choice: "(1/2):",
            invalid_choice: "Error: enter 1 or 2.",
            load_file_name: "File to load clusters from: ",
            load_file_failed: "Error while loading clusters: ",
            table_name: "Table name:",
            load_table_failed: "Error while loading the table: ",
            radius: "Radius:",
            invalid_radius: "Error: enter a positive number.",
            cluster_count: "Number of Clusters:",
            clustering_failed: "Error during clustering: ",
            save_question: "Save the clusters to a file?(y/n)",
            save_file_name: "File to save the clusters to (e.g. 'clusters.dat'): ",
            saved: "Clusters saved to file: ",
            save_failed: "Error while saving the clusters: ",
            repeat: "Would you repeat?(y/n)",
            new_operation: "would you choose a new operation from menu?(y/n)",
            disconnected: "Connection to the server lost.",
        }
    }

    pub fn italian() -> Self {
        Prompts {
            menu: "\n(1) Carica cluster da file\n(2) Carica dati da db",
            menu_choice: "(1/2):",
            invalid_choice: "Errore: inserisci 1 o 2.",
            load_file_name: "Nome del file da cui caricare i cluster: ",
            load_file_failed: "Errore durante l'operazione: ",
            table_name: "Nome tabella:",
            load_table_failed: "Errore durante il caricamento della tabella: ",
            radius: "Raggio:",
            invalid_radius: "Errore: inserisci un numero positivo.",
            cluster_count: "Numero di cluster:",
            clustering_failed: "Errore durante il clustering: ",
            save_question: "Salvare i cluster su file?(y/n)",
            save_file_name: "Nome del file su cui salvare i cluster (es. 'clusters.dat'): ",
            saved: "Cluster salvati nel file: ",
            save_failed: "Errore durante il salvataggio: ",
            repeat: "Ripetere?(y/n)",
            new_operation: "Scegliere una nuova operazione dal menu?(y/n)",
            disconnected: "Connessione al server persa.",
        }
    }
}

impl Default for Prompts {
    fn default() -> Self {
        Self::english()
    }
}
