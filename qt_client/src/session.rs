//! Session controller: the state machine that sequences client operations
//! and the interactive menu loop built on top of it.

use crate::console::{is_yes, Console, Prompts};
use crate::error::{Result, SessionError};
use log::{debug, error, info, warn};
use qt_protocol::{
    Clustering, Codec, ConnectionError, Connection, Opcode, QtClient, Radius, TcpTransport,
    TransportConfig,
};
use strum::{Display, EnumString};

/// Where the session stands with respect to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SessionState {
    Disconnected,
    Idle,
    TableLoaded,
    Clustered,
}

/// When to offer saving after a clustering run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SaveMode {
    /// Ask for a file name and save after every run
    #[default]
    Always,
    /// Ask whether to save first
    Ask,
    Never,
}

/// Flow and prompt variants of the interactive loop
#[derive(Debug, Clone, Default)]
pub struct FlowConfig {
    pub save_mode: SaveMode,
    pub prompts: Prompts,
}

/// Entries of the main menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    LoadFromFile,
    ClusterFromTable,
}

impl MenuChoice {
    fn parse(line: &str) -> Option<Self> {
        match line.trim().parse::<u32>().ok()? {
            1 => Some(MenuChoice::LoadFromFile),
            2 => Some(MenuChoice::ClusterFromTable),
            _ => None,
        }
    }
}

/// How a menu branch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Branch {
    /// Ask whether to pick another operation
    Finished,
    /// Go straight back to the menu
    BackToMenu,
    /// End of input or lost connection
    Exit,
}

/// One interactive session owning the connection to the server
pub struct Session<C: Codec> {
    client: QtClient<C>,
    state: SessionState,
    flow: FlowConfig,
}

impl Session<Connection<TcpTransport>> {
    /// Connect to the server; the session starts Idle
    pub fn connect(
        host: &str,
        port: u16,
        transport: &TransportConfig,
        flow: FlowConfig,
    ) -> std::result::Result<Self, ConnectionError> {
        let client = QtClient::connect(host, port, transport)?;
        Ok(Session::new(client, flow))
    }
}

impl<C: Codec> Session<C> {
    pub fn new(client: QtClient<C>, flow: FlowConfig) -> Self {
        Session {
            client,
            state: SessionState::Idle,
            flow,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn client(&self) -> &QtClient<C> {
        &self.client
    }

    pub fn load_table(&mut self, table_name: &str) -> Result<()> {
        self.require(Opcode::LoadTable, |_| true)?;
        let result = self.client.load_table(table_name);
        self.settle(result, SessionState::TableLoaded)
    }

    pub fn run_clustering(&mut self, radius: Radius) -> Result<Clustering> {
        self.require(Opcode::RunClustering, |state| {
            matches!(state, SessionState::TableLoaded | SessionState::Clustered)
        })?;
        let result = self.client.run_clustering(radius);
        self.settle(result, SessionState::Clustered)
    }

    pub fn save_to_file(&mut self, file_name: &str) -> Result<()> {
        self.require(Opcode::SaveToFile, |state| state == SessionState::Clustered)?;
        let result = self.client.save_to_file(file_name);
        self.settle(result, SessionState::Clustered)
    }

    /// Fetch a stored cluster set; never changes the session state
    pub fn load_from_file(&mut self, file_name: &str) -> Result<String> {
        self.require(Opcode::LoadFromFile, |_| true)?;
        let result = self.client.load_from_file(file_name);
        let unchanged = self.state;
        self.settle(result, unchanged)
    }

    fn require(&self, operation: Opcode, allowed: impl Fn(SessionState) -> bool) -> Result<()> {
        if self.state != SessionState::Disconnected && allowed(self.state) {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    /// Move to `next` on success; only a fatal channel failure changes state on error
    fn settle<T>(
        &mut self,
        result: std::result::Result<T, qt_protocol::ClientError>,
        next: SessionState,
    ) -> Result<T> {
        match result {
            Ok(value) => {
                if self.state != next {
                    debug!("Session state {} -> {}", self.state, next);
                    self.state = next;
                }
                Ok(value)
            }
            Err(e) => {
                if e.is_fatal() {
                    error!("❌ Connection lost: {}", e);
                    self.state = SessionState::Disconnected;
                }
                Err(e.into())
            }
        }
    }

    /// Run the interactive menu loop until the user quits or input ends
    pub fn run<K: Console>(&mut self, console: &mut K) -> Result<()> {
        info!("🚀 Session started");

        loop {
            let Some(choice) = self.read_menu_choice(console)? else {
                break;
            };

            let branch = match choice {
                MenuChoice::LoadFromFile => self.load_from_file_branch(console)?,
                MenuChoice::ClusterFromTable => self.clustering_branch(console)?,
            };

            match branch {
                Branch::Exit => break,
                Branch::BackToMenu => continue,
                Branch::Finished => {}
            }

            match console.prompt(self.flow.prompts.new_operation)? {
                Some(answer) if is_yes(&answer) => {}
                _ => break,
            }
        }

        info!("👋 Session finished in state {}", self.state);
        Ok(())
    }

    /// Show the menu until a valid choice is entered; `None` at end of input
    fn read_menu_choice<K: Console>(&self, console: &mut K) -> Result<Option<MenuChoice>> {
        let prompts = &self.flow.prompts;
        loop {
            console.show(prompts.menu)?;
            let Some(line) = console.prompt(prompts.menu_choice)? else {
                return Ok(None);
            };
            match MenuChoice::parse(&line) {
                Some(choice) => return Ok(Some(choice)),
                None => console.report(prompts.invalid_choice)?,
            }
        }
    }

    /// Prompt until a positive radius is entered; `None` at end of input
    fn read_radius<K: Console>(&self, console: &mut K) -> Result<Option<Radius>> {
        let prompts = &self.flow.prompts;
        loop {
            let Some(line) = console.prompt(prompts.radius)? else {
                return Ok(None);
            };
            match line.trim().parse::<f64>().ok().map(Radius::new) {
                Some(Ok(radius)) => return Ok(Some(radius)),
                _ => console.report(prompts.invalid_radius)?,
            }
        }
    }

    fn load_from_file_branch<K: Console>(&mut self, console: &mut K) -> Result<Branch> {
        let prompts = self.flow.prompts.clone();
        let Some(file_name) = console.prompt(prompts.load_file_name)? else {
            return Ok(Branch::Exit);
        };

        match self.load_from_file(&file_name) {
            Ok(description) => {
                console.show(&description)?;
                Ok(Branch::Finished)
            }
            Err(e) => self.fail(console, prompts.load_file_failed, e, Branch::Finished),
        }
    }

    fn clustering_branch<K: Console>(&mut self, console: &mut K) -> Result<Branch> {
        let prompts = self.flow.prompts.clone();
        let Some(table_name) = console.prompt(prompts.table_name)? else {
            return Ok(Branch::Exit);
        };

        if let Err(e) = self.load_table(&table_name) {
            return self.fail(console, prompts.load_table_failed, e, Branch::BackToMenu);
        }

        loop {
            let Some(radius) = self.read_radius(console)? else {
                return Ok(Branch::Exit);
            };

            match self.run_clustering(radius) {
                Ok(clustering) => {
                    let count = format!("{}{}", prompts.cluster_count, clustering.cluster_count);
                    console.show(&count)?;
                    console.show(&clustering.description)?;
                }
                Err(e) => return self.fail(console, prompts.clustering_failed, e, Branch::Finished),
            }

            if let Some(branch) = self.save_step(console)? {
                return Ok(branch);
            }

            match console.prompt(prompts.repeat)? {
                Some(answer) if is_yes(&answer) => continue,
                Some(_) => return Ok(Branch::Finished),
                None => return Ok(Branch::Exit),
            }
        }
    }

    /// Offer saving according to the configured mode; `Some` ends the branch
    fn save_step<K: Console>(&mut self, console: &mut K) -> Result<Option<Branch>> {
        let prompts = self.flow.prompts.clone();
        match self.flow.save_mode {
            SaveMode::Never => return Ok(None),
            SaveMode::Ask => match console.prompt(prompts.save_question)? {
                Some(answer) if is_yes(&answer) => {}
                Some(_) => return Ok(None),
                None => return Ok(Some(Branch::Exit)),
            },
            SaveMode::Always => {}
        }

        let Some(file_name) = console.prompt(prompts.save_file_name)? else {
            return Ok(Some(Branch::Exit));
        };

        match self.save_to_file(&file_name) {
            Ok(()) => {
                console.show(&format!("{}{}", prompts.saved, file_name))?;
                Ok(None)
            }
            Err(e) => self
                .fail(console, prompts.save_failed, e, Branch::Finished)
                .map(Some),
        }
    }

    /// Report a failed operation and pick how the branch continues
    fn fail<K: Console>(
        &self,
        console: &mut K,
        context: &str,
        err: SessionError,
        otherwise: Branch,
    ) -> Result<Branch> {
        if let SessionError::Console(_) = err {
            return Err(err);
        }

        warn!("{}{}", context, err);
        console.report(&format!("{}{}", context, err))?;

        if err.is_fatal() {
            console.report(self.flow.prompts.disconnected)?;
            Ok(Branch::Exit)
        } else {
            Ok(otherwise)
        }
    }
}
