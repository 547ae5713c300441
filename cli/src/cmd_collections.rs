// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

use std::error::Error;

use clap::{Arg, ArgMatches, Command, arg, value_parser};
use colored::Color;
use groupsync_core::{ItemState, LocalCollection, LocalItem, Pager};
use jiff::tz::TimeZone;

use crate::context::Context;
use crate::table::{Column, PaddingDirection, Table};

#[derive(Debug, Clone, Copy)]
pub struct CmdCollections {
    pub all: bool,
}

impl CmdCollections {
    pub const NAME: &str = "collections";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .alias("ls")
            .about("List the local collections of the account")
            .arg(arg!(-a --all "Include collections deactivated after vanishing remotely"))
    }

    pub fn from(matches: &ArgMatches) -> Self {
        Self {
            all: matches.get_flag("all"),
        }
    }

    pub async fn run(self, ctx: &Context) -> Result<(), Box<dyn Error>> {
        tracing::debug!(?self, "listing collections...");
        let collections: Vec<_> = ctx
            .db
            .collections
            .list(ctx.account())
            .await?
            .into_iter()
            .filter(|c| self.all || c.visible || c.sync_enabled)
            .collect();

        let columns = [
            CollectionColumn::Id,
            CollectionColumn::Kind,
            CollectionColumn::Access,
            CollectionColumn::Sync,
            CollectionColumn::Name,
        ];
        print!("{}", Table::new(&columns, &collections));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum CollectionColumn {
    Id,
    Kind,
    Access,
    Sync,
    Name,
}

impl Column<LocalCollection> for CollectionColumn {
    fn name(&self) -> &'static str {
        match self {
            CollectionColumn::Id => "ID",
            CollectionColumn::Kind => "Kind",
            CollectionColumn::Access => "Access",
            CollectionColumn::Sync => "Sync",
            CollectionColumn::Name => "Name",
        }
    }

    fn format(&self, data: &LocalCollection) -> String {
        match self {
            CollectionColumn::Id => data.local_id.to_string(),
            CollectionColumn::Kind => data.kind.to_string(),
            CollectionColumn::Access => data.access_level.to_string(),
            CollectionColumn::Sync => match (data.sync_enabled, data.visible) {
                (true, _) => "on",
                (false, true) => "off",
                (false, false) => "inactive",
            }
            .to_string(),
            CollectionColumn::Name => data.display_name.clone(),
        }
    }

    fn padding_direction(&self) -> PaddingDirection {
        match self {
            CollectionColumn::Id => PaddingDirection::Right,
            _ => PaddingDirection::Left,
        }
    }

    fn color(&self, data: &LocalCollection) -> Option<Color> {
        match self {
            CollectionColumn::Sync if !data.sync_enabled => Some(Color::BrightBlack),
            CollectionColumn::Access if data.is_read_only() => Some(Color::Yellow),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CmdItems {
    pub collection_id: i64,
    pub limit: i64,
    pub offset: i64,
}

impl CmdItems {
    pub const NAME: &str = "items";

    const DEFAULT_LIMIT: i64 = 50;

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .about("List the local items of a collection with their sync state")
            .arg(
                arg!(<COLLECTION_ID> "Local id of the collection, see `collections`")
                    .value_parser(value_parser!(i64)),
            )
            .arg(Self::arg_number("limit", "Maximum number of items to show", "50"))
            .arg(Self::arg_number("offset", "Number of items to skip", "0"))
    }

    fn arg_number(name: &'static str, help: &'static str, default: &'static str) -> Arg {
        Arg::new(name)
            .long(name)
            .value_name("N")
            .help(help)
            .value_parser(value_parser!(i64).range(0..))
            .default_value(default)
    }

    pub fn from(matches: &ArgMatches) -> Result<Self, Box<dyn Error>> {
        let collection_id = matches
            .get_one::<i64>("COLLECTION_ID")
            .copied()
            .ok_or("collection id is required")?;
        Ok(Self {
            collection_id,
            limit: matches
                .get_one("limit")
                .copied()
                .unwrap_or(Self::DEFAULT_LIMIT),
            offset: matches.get_one("offset").copied().unwrap_or(0),
        })
    }

    pub async fn run(self, ctx: &Context) -> Result<(), Box<dyn Error>> {
        tracing::debug!(?self, "listing items...");
        let collection = ctx
            .db
            .collections
            .get(self.collection_id)
            .await?
            .filter(|c| c.account == ctx.account())
            .ok_or_else(|| format!("No collection with id {}", self.collection_id))?;

        let pager: Pager = (self.limit, self.offset).into();
        let items = ctx.db.items.list_page(collection.local_id, &pager).await?;
        let total = ctx.db.items.count(collection.local_id).await?;
        if self.offset > 0 || total > i64::try_from(items.len()).unwrap_or(i64::MAX) {
            println!(
                "Displaying {} of {total} items in {}",
                items.len(),
                collection.display_name
            );
        }

        let tz = TimeZone::system();
        let columns = [
            ItemColumn::Id,
            ItemColumn::State,
            ItemColumn::Start(tz),
            ItemColumn::Title,
            ItemColumn::Identifier,
        ];
        print!("{}", Table::new(&columns, &items));
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum ItemColumn {
    Id,
    State,
    Start(TimeZone),
    Title,
    Identifier,
}

impl Column<LocalItem> for ItemColumn {
    fn name(&self) -> &'static str {
        match self {
            ItemColumn::Id => "ID",
            ItemColumn::State => "State",
            ItemColumn::Start(_) => "Start",
            ItemColumn::Title => "Title",
            ItemColumn::Identifier => "Identifier",
        }
    }

    fn format(&self, data: &LocalItem) -> String {
        match self {
            ItemColumn::Id => data.local_id.to_string(),
            ItemColumn::State => data.state().to_string(),
            ItemColumn::Start(tz) => match data.range {
                Some(range) if range.all_day => range
                    .start
                    .to_zoned(TimeZone::UTC)
                    .strftime("%Y-%m-%d")
                    .to_string(),
                Some(range) => range
                    .start
                    .to_zoned(tz.clone())
                    .strftime("%Y-%m-%d %H:%M")
                    .to_string(),
                None => String::new(),
            },
            ItemColumn::Title => data.fields.title().to_string(),
            ItemColumn::Identifier => data
                .sync_identifier
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
        }
    }

    fn padding_direction(&self) -> PaddingDirection {
        match self {
            ItemColumn::Id => PaddingDirection::Right,
            _ => PaddingDirection::Left,
        }
    }

    fn color(&self, data: &LocalItem) -> Option<Color> {
        match self {
            ItemColumn::State => match data.state() {
                ItemState::Synced => Some(Color::Green),
                ItemState::Dirty | ItemState::Unsynced => Some(Color::Yellow),
                ItemState::PendingResolution => Some(Color::Cyan),
                ItemState::Tombstoned => Some(Color::BrightBlack),
            },
            _ => None,
        }
    }
}
