use client_console_schemas::{Client, ClientId, ClientStatus};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::{DraftField, FieldProblem, ValidationErrors};

/// Which of the two link lists an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkList {
    GoogleDrive,
    Website,
}

/// Local, unsaved state of the client form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientDraft {
    pub name: String,
    pub agent_name: String,
    pub full_name: String,
    pub email: String,
    pub company: String,
    pub website: String,
    pub description: String,
    pub google_drive_links: Vec<String>,
    pub website_urls: Vec<String>,
    pub status: ClientStatus,
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap())
}

fn optional(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl ClientDraft {
    pub fn from_client(client: &Client) -> Self {
        Self {
            name: client.name.clone(),
            agent_name: client.agent_name.clone(),
            full_name: client.full_name.clone().unwrap_or_default(),
            email: client.email.clone().unwrap_or_default(),
            company: client.company.clone().unwrap_or_default(),
            website: client.website.clone().unwrap_or_default(),
            description: client.description.clone().unwrap_or_default(),
            google_drive_links: client.google_drive_links.clone(),
            website_urls: client.website_urls.clone(),
            status: client.status,
        }
    }

    fn links_mut(&mut self, list: LinkList) -> &mut Vec<String> {
        match list {
            LinkList::GoogleDrive => &mut self.google_drive_links,
            LinkList::Website => &mut self.website_urls,
        }
    }

    pub fn links(&self, list: LinkList) -> &[String] {
        match list {
            LinkList::GoogleDrive => &self.google_drive_links,
            LinkList::Website => &self.website_urls,
        }
    }

    /// Add a blank entry at the end of the list
    pub fn append_link(&mut self, list: LinkList) {
        self.links_mut(list).push(String::new());
    }

    /// Replace the entry at `index`. Returns `false` and changes nothing when
    /// the index is out of range.
    pub fn edit_link(&mut self, list: LinkList, index: usize, value: impl Into<String>) -> bool {
        match self.links_mut(list).get_mut(index) {
            Some(entry) => {
                *entry = value.into();
                true
            }
            None => false,
        }
    }

    /// Remove the entry at `index`, shifting later entries down
    pub fn remove_link(&mut self, list: LinkList, index: usize) -> bool {
        let links = self.links_mut(list);
        if index < links.len() {
            links.remove(index);
            true
        } else {
            false
        }
    }

    /// Check required fields and formats, reporting every problem at once
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        if self.name.trim().is_empty() {
            errors.push(DraftField::Name, FieldProblem::Required);
        }
        if self.agent_name.trim().is_empty() {
            errors.push(DraftField::AgentName, FieldProblem::Required);
        }

        let email = self.email.trim();
        if !email.is_empty() && !email_pattern().is_match(email) {
            errors.push(DraftField::Email, FieldProblem::InvalidEmail);
        }

        let website = self.website.trim();
        if !website.is_empty() && !(website.starts_with("http://") || website.starts_with("https://"))
        {
            errors.push(DraftField::Website, FieldProblem::InvalidUrl);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Full record payload for this draft. Blank optional fields become absent.
    pub fn to_client(&self, id: ClientId, created_at: String, updated_at: String) -> Client {
        Client {
            id,
            name: self.name.clone(),
            agent_name: self.agent_name.clone(),
            full_name: optional(&self.full_name),
            email: optional(&self.email).map(|email| email.trim().to_string()),
            company: optional(&self.company),
            website: optional(&self.website).map(|website| website.trim().to_string()),
            description: optional(&self.description),
            google_drive_links: self.google_drive_links.clone(),
            website_urls: self.website_urls.clone(),
            status: self.status,
            created_at,
            updated_at,
        }
    }
}
