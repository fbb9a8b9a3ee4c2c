//! The sandbox command console.
//!
//! Each command maps onto one operation of the engine. Errors from the core
//! are printed, never propagated; the console itself only fails on broken
//! standard input.

use std::io::{self, Write};
use std::num::NonZeroU32;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::io::{AsyncBufReadExt, BufReader};

use guichet_core::{IdleReaper, Runtime};
use guichet_platform::{MemoryPlatform, Platform};
use guichet_shared::{ChannelId, GuildId, MessageId, PanelStyle, RoleId, UserId};
use guichet_store::{Category, Ticket};

const HELP: &str = "\
tickets
  new [category]              open a ticket as the current user
  close <channel> [reason]    close a ticket
  claim <channel>             claim a ticket (staff)
  add <channel> <user>        add a participant (staff)
  remove <channel> <user>     remove a participant (staff)
  info <channel>              show one ticket record
  stats                       community statistics
  mystats                     statistics for the current user
  transcript <channel>        print the channel transcript
  rate <channel> <1-5> [comment]  leave feedback

panels
  panel <buttons|dropdown>    publish a panel in the lobby
  panels                      list registered panels
  select <message> <category> simulate a panel selection
  panel-rm <message>          delete a panel

simulation
  say <channel> <text>        write a message as the current user
  ago <channel> <hours> <text> write a message that far in the past
  sweep                       run one idle sweep now
  as <user>                   act as another user
  users                       list seeded users

admin
  settings                    show community settings
  set limit <n> | set autoclose <hours> <warn> | set color <rrggbb>
  set claim on|off | set claimdm on|off | set feedback on|off
  set dm on|off | set ping on|off
  set pingrole <role|none> | set log <channel|none> | set category <name>
  set welcome <text> | set nameformat <text>
  cat list | cat add <name> <emoji> [description] | cat rm <name> | cat toggle <name>
  bl list | bl add <user> | bl rm <user>
  setup                       register the Support role
  reset confirm               wipe all community state

quit";

fn report<T>(result: guichet_core::Result<T>, ok: impl FnOnce(T) -> String) {
    match result {
        Ok(value) => println!("{}", ok(value)),
        Err(e) => println!("error: {e}"),
    }
}

pub struct Repl {
    runtime: Runtime,
    reaper: IdleReaper,
    platform: Arc<MemoryPlatform>,
    guild: GuildId,
    lobby: ChannelId,
    users: Vec<(String, UserId)>,
    actor: UserId,
}

impl Repl {
    pub fn new(
        runtime: Runtime,
        reaper: IdleReaper,
        platform: Arc<MemoryPlatform>,
        guild: GuildId,
        lobby: ChannelId,
        users: Vec<(String, UserId)>,
    ) -> Self {
        // Start as a regular member; `as root` switches to the admin.
        let actor = users
            .iter()
            .find(|(name, _)| name == "alice")
            .map(|(_, id)| *id)
            .unwrap_or(UserId(0));
        Self {
            runtime,
            reaper,
            platform,
            guild,
            lobby,
            users,
            actor,
        }
    }

    pub fn print_banner(&self) {
        println!("guichet sandbox: one community, lobby channel {}", self.lobby);
        println!("type `help` for commands, `quit` to leave");
    }

    pub fn into_runtime(self) -> Runtime {
        self.runtime
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();
        loop {
            self.prompt()?;
            let Some(line) = lines.next_line().await? else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "quit" || line == "exit" {
                break;
            }
            self.dispatch(line).await;
        }
        Ok(())
    }

    fn prompt(&self) -> io::Result<()> {
        print!("{}> ", self.name_of(self.actor));
        io::stdout().flush()
    }

    async fn dispatch(&mut self, line: &str) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            ["help"] => println!("{HELP}"),

            ["new"] => self.cmd_new(None).await,
            ["new", category] => self.cmd_new(Some(category)).await,
            ["close", channel, reason @ ..] => self.cmd_close(channel, reason).await,
            ["claim", channel] => self.cmd_claim(channel).await,
            ["add", channel, user] => self.cmd_participant(channel, user, true).await,
            ["remove", channel, user] => self.cmd_participant(channel, user, false).await,
            ["info", channel] => self.cmd_info(channel),
            ["stats"] => self.cmd_stats(),
            ["mystats"] => self.cmd_mystats(),
            ["transcript", channel] => self.cmd_transcript(channel).await,
            ["rate", channel, rating, comment @ ..] => {
                self.cmd_rate(channel, rating, comment).await
            }

            ["panel", style] => self.cmd_panel(style).await,
            ["panels"] => self.cmd_panels().await,
            ["select", message, category] => self.cmd_select(message, category).await,
            ["panel-rm", message] => self.cmd_panel_rm(message).await,

            ["say", channel, text @ ..] if !text.is_empty() => self.cmd_say(channel, None, text),
            ["ago", channel, hours, text @ ..] if !text.is_empty() => {
                self.cmd_say(channel, Some(hours), text)
            }
            ["sweep"] => report(self.reaper.sweep().await, |_| "sweep done".to_string()),
            ["as", user] => self.cmd_as(user),
            ["users"] => self.cmd_users(),

            ["settings"] => self.cmd_settings().await,
            ["set", rest @ ..] => self.cmd_set(rest).await,
            ["cat", rest @ ..] => self.cmd_cat(rest).await,
            ["bl", rest @ ..] => self.cmd_bl(rest).await,
            ["setup"] => {
                report(
                    self.runtime.service().quick_setup(self.guild, self.actor).await,
                    |role| match role {
                        Some(role) => format!("registered support role {role}"),
                        None => "no role named Support found".to_string(),
                    },
                )
            }
            ["reset", token] => report(
                self.runtime.service().reset(self.guild, self.actor, token).await,
                |_| "community state wiped".to_string(),
            ),

            _ => println!("unknown command, try `help`"),
        }
    }

    // ------------------------------------------------------------
    // Tickets
    // ------------------------------------------------------------

    async fn cmd_new(&self, category: Option<&str>) {
        let result = self
            .runtime
            .service()
            .create(self.guild, self.actor, category)
            .await;
        match result {
            Ok(ticket) => {
                let name = self
                    .platform
                    .channel_name(ticket.channel)
                    .await
                    .unwrap_or_default();
                println!(
                    "ticket #{} opened in channel {} ({name})",
                    ticket.number, ticket.channel
                );
            }
            Err(e) => println!("error: {e}"),
        }
    }

    async fn cmd_close(&self, channel: &str, reason: &[&str]) {
        let Some(channel) = parse_channel(channel) else {
            return println!("usage: close <channel> [reason]");
        };
        let reason = join_opt(reason);
        report(
            self.runtime
                .service()
                .close(self.guild, self.actor, channel, reason.as_deref())
                .await,
            |t| format!("ticket #{} closed, channel deletion scheduled", t.number),
        );
    }

    async fn cmd_claim(&self, channel: &str) {
        let Some(channel) = parse_channel(channel) else {
            return println!("usage: claim <channel>");
        };
        report(
            self.runtime
                .service()
                .claim(self.guild, self.actor, channel)
                .await,
            |t| format!("ticket #{} claimed", t.number),
        );
    }

    async fn cmd_participant(&self, channel: &str, user: &str, add: bool) {
        let (Some(channel), Some(user)) = (parse_channel(channel), self.user(user)) else {
            return println!("usage: add|remove <channel> <user>");
        };
        let result = if add {
            self.runtime
                .service()
                .add_participant(self.guild, self.actor, channel, user)
                .await
        } else {
            self.runtime
                .service()
                .remove_participant(self.guild, self.actor, channel, user)
                .await
        };
        let verb = if add { "added" } else { "removed" };
        report(result, |_| format!("{} {verb}", self.name_of(user)));
    }

    fn cmd_info(&self, channel: &str) {
        let Some(channel) = parse_channel(channel) else {
            return println!("usage: info <channel>");
        };
        match self.runtime.service().ticket_info(self.guild, channel) {
            Ok(ticket) => self.print_ticket(&ticket),
            Err(e) => println!("error: {e}"),
        }
    }

    fn cmd_stats(&self) {
        match self.runtime.service().guild_stats(self.guild) {
            Ok(stats) => {
                println!(
                    "{} total, {} open, {} closed, {} panel(s)",
                    stats.total, stats.open, stats.closed, stats.panels
                );
                for (category, count) in &stats.by_category {
                    println!("  {category}: {count}");
                }
            }
            Err(e) => println!("error: {e}"),
        }
    }

    fn cmd_mystats(&self) {
        match self.runtime.service().user_stats(self.guild, self.actor) {
            Ok(stats) => {
                let rating = stats
                    .average_rating
                    .map(|r| format!("{r:.1}"))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{} created, {} open, {} closed, average rating {rating}",
                    stats.created, stats.open, stats.closed
                );
            }
            Err(e) => println!("error: {e}"),
        }
    }

    async fn cmd_transcript(&self, channel: &str) {
        let Some(channel) = parse_channel(channel) else {
            return println!("usage: transcript <channel>");
        };
        match self.runtime.transcripts().export(self.guild, channel).await {
            Ok(transcript) => {
                println!("--- {} ({} messages)", transcript.file_name, transcript.message_count);
                println!("{}", transcript.content);
            }
            Err(e) => println!("error: {e}"),
        }
    }

    async fn cmd_rate(&self, channel: &str, rating: &str, comment: &[&str]) {
        let (Some(channel), Ok(rating)) = (parse_channel(channel), rating.parse::<u8>()) else {
            return println!("usage: rate <channel> <1-5> [comment]");
        };
        report(
            self.runtime
                .feedback()
                .record(self.actor, channel, rating, join_opt(comment))
                .await,
            |entry| format!("thanks, recorded {} star(s)", entry.rating),
        );
    }

    // ------------------------------------------------------------
    // Panels
    // ------------------------------------------------------------

    async fn cmd_panel(&self, style: &str) {
        let Ok(style) = style.parse::<PanelStyle>() else {
            return println!("usage: panel <buttons|dropdown>");
        };
        report(
            self.runtime
                .panels()
                .create(self.guild, self.actor, self.lobby, style, None)
                .await,
            |message| format!("panel published as message {message}"),
        );
    }

    async fn cmd_panels(&self) {
        match self.runtime.panels().list(self.guild, self.actor).await {
            Ok(panels) if panels.is_empty() => println!("no panels registered"),
            Ok(panels) => {
                for (message, panel) in panels {
                    println!(
                        "message {message} in channel {} ({}, since {})",
                        panel.channel,
                        panel.style,
                        panel.created_at.format("%d.%m.%Y %H:%M")
                    );
                }
            }
            Err(e) => println!("error: {e}"),
        }
    }

    async fn cmd_select(&self, message: &str, category: &str) {
        let Some(message) = parse_message(message) else {
            return println!("usage: select <message> <category>");
        };
        report(
            self.runtime
                .panels()
                .handle_selection(message, self.actor, category)
                .await,
            |t| format!("ticket #{} opened in channel {}", t.number, t.channel),
        );
    }

    async fn cmd_panel_rm(&self, message: &str) {
        let Some(message) = parse_message(message) else {
            return println!("usage: panel-rm <message>");
        };
        report(
            self.runtime.panels().delete(self.guild, self.actor, message).await,
            |_| "panel deleted".to_string(),
        );
    }

    // ------------------------------------------------------------
    // Simulation
    // ------------------------------------------------------------

    fn cmd_say(&self, channel: &str, hours_ago: Option<&str>, text: &[&str]) {
        let Some(channel) = parse_channel(channel) else {
            return println!("usage: say <channel> <text>");
        };
        let hours = match hours_ago {
            Some(h) => match h.parse::<i64>() {
                Ok(h) => h,
                Err(_) => return println!("usage: ago <channel> <hours> <text>"),
            },
            None => 0,
        };
        let at = Utc::now() - Duration::hours(hours);
        match self.platform.say_at(channel, self.actor, &text.join(" "), at) {
            Ok(_) => println!("said"),
            Err(e) => println!("error: {e}"),
        }
    }

    fn cmd_as(&mut self, user: &str) {
        match self.user(user) {
            Some(id) => {
                self.actor = id;
                println!("now acting as {}", self.name_of(id));
            }
            None => println!("unknown user, try `users`"),
        }
    }

    fn cmd_users(&self) {
        for (name, id) in &self.users {
            println!("  {name} ({id})");
        }
    }

    // ------------------------------------------------------------
    // Admin
    // ------------------------------------------------------------

    async fn cmd_settings(&self) {
        match self.runtime.service().settings(self.guild, self.actor).await {
            Ok(s) => {
                println!("ticket_limit       {}", s.ticket_limit);
                println!("default_category   {}", s.default_category);
                println!(
                    "auto_close         {}h (warning {}h before)",
                    s.auto_close_hours, s.auto_close_warning_hours
                );
                println!("claim_enabled      {}", s.claim_enabled);
                println!("feedback_enabled   {}", s.feedback_enabled);
                println!("dm_notifications   {}", s.dm_notifications);
                println!("ping_on_create     {}", s.ping_on_create);
                println!("embed_color        #{:06x}", s.embed_color);
                println!(
                    "support_roles      {:?}",
                    s.support_roles.iter().map(|r| r.get()).collect::<Vec<_>>()
                );
                println!(
                    "admin_roles        {:?}",
                    s.admin_roles.iter().map(|r| r.get()).collect::<Vec<_>>()
                );
                println!(
                    "log_channel        {}",
                    s.log_channel.map(|c| c.to_string()).unwrap_or_else(|| "-".into())
                );
                println!("name_format        {}", s.ticket_name_format);
                println!("welcome            {}", s.welcome_message);
            }
            Err(e) => println!("error: {e}"),
        }
    }

    async fn cmd_set(&self, args: &[&str]) {
        let service = self.runtime.service();
        let result = match args {
            ["limit", n] => match n.parse::<NonZeroU32>() {
                Ok(limit) => service.set_ticket_limit(self.guild, self.actor, limit).await,
                Err(_) => return println!("usage: set limit <positive number>"),
            },
            ["autoclose", hours, warn] => {
                match (hours.parse::<u32>(), warn.parse::<u32>()) {
                    (Ok(h), Ok(w)) => service.set_auto_close(self.guild, self.actor, h, w).await,
                    _ => return println!("usage: set autoclose <hours> <warning-hours>"),
                }
            }
            ["claim", flag] => match parse_flag(flag) {
                Some(on) => service.set_claim_enabled(self.guild, self.actor, on).await,
                None => return println!("usage: set claim on|off"),
            },
            ["claimdm", flag] => match parse_flag(flag) {
                Some(on) => {
                    service
                        .set_claim_notifications(self.guild, self.actor, on)
                        .await
                }
                None => return println!("usage: set claimdm on|off"),
            },
            ["feedback", flag] => match parse_flag(flag) {
                Some(on) => service.set_feedback_enabled(self.guild, self.actor, on).await,
                None => return println!("usage: set feedback on|off"),
            },
            ["dm", flag] => match parse_flag(flag) {
                Some(on) => service.set_dm_notifications(self.guild, self.actor, on).await,
                None => return println!("usage: set dm on|off"),
            },
            ["ping", flag] => match parse_flag(flag) {
                Some(on) => service.set_ping_on_create(self.guild, self.actor, on).await,
                None => return println!("usage: set ping on|off"),
            },
            ["pingrole", "none"] => service.set_ping_role(self.guild, self.actor, None).await,
            ["pingrole", role] => match role.parse::<RoleId>() {
                Ok(role) => service.set_ping_role(self.guild, self.actor, Some(role)).await,
                Err(_) => return println!("usage: set pingrole <role id|none>"),
            },
            ["color", hex] => {
                match u32::from_str_radix(hex.trim_start_matches('#'), 16) {
                    Ok(color) => service.set_embed_color(self.guild, self.actor, color).await,
                    Err(_) => return println!("usage: set color <rrggbb>"),
                }
            }
            ["log", "none"] => service.set_log_channel(self.guild, self.actor, None).await,
            ["log", channel] => match parse_channel(channel) {
                Some(channel) => {
                    service
                        .set_log_channel(self.guild, self.actor, Some(channel))
                        .await
                }
                None => return println!("usage: set log <channel|none>"),
            },
            ["category", name] => {
                service
                    .set_default_category(self.guild, self.actor, name.to_string())
                    .await
            }
            ["welcome", rest @ ..] if !rest.is_empty() => {
                service
                    .set_welcome_message(self.guild, self.actor, rest.join(" "))
                    .await
            }
            ["nameformat", rest @ ..] if !rest.is_empty() => {
                service
                    .set_name_format(self.guild, self.actor, rest.join(" "))
                    .await
            }
            _ => return println!("unknown setting, try `help`"),
        };
        report(result, |_| "done".to_string());
    }

    async fn cmd_cat(&self, args: &[&str]) {
        let service = self.runtime.service();
        match args {
            ["list"] => match service.categories(self.guild, self.actor).await {
                Ok(catalog) => {
                    for (name, category) in catalog {
                        let state = if category.enabled { "enabled" } else { "disabled" };
                        println!("  {} {name} [{state}] {}", category.emoji, category.description);
                    }
                }
                Err(e) => println!("error: {e}"),
            },
            ["add", name, emoji, description @ ..] => report(
                service
                    .add_category(
                        self.guild,
                        self.actor,
                        name.to_string(),
                        Category {
                            emoji: emoji.to_string(),
                            description: description.join(" "),
                            color: 0x0034_98db,
                            enabled: true,
                        },
                    )
                    .await,
                |_| format!("category {name} added"),
            ),
            ["rm", name] => report(
                service.remove_category(self.guild, self.actor, name).await,
                |_| format!("category {name} removed"),
            ),
            ["toggle", name] => report(
                service.toggle_category(self.guild, self.actor, name).await,
                |enabled| {
                    if enabled {
                        format!("category {name} enabled")
                    } else {
                        format!("category {name} disabled")
                    }
                },
            ),
            _ => println!("usage: cat list|add|rm|toggle"),
        }
    }

    async fn cmd_bl(&self, args: &[&str]) {
        let service = self.runtime.service();
        match args {
            ["list"] => match service.blacklist(self.guild, self.actor).await {
                Ok(users) if users.is_empty() => println!("blacklist is empty"),
                Ok(users) => {
                    for user in users {
                        println!("  {}", self.name_of(user));
                    }
                }
                Err(e) => println!("error: {e}"),
            },
            ["add", user] => match self.user(user) {
                Some(user) => report(
                    service.blacklist_add(self.guild, self.actor, user).await,
                    |added| {
                        if added {
                            "blacklisted".to_string()
                        } else {
                            "already blacklisted".to_string()
                        }
                    },
                ),
                None => println!("unknown user"),
            },
            ["rm", user] => match self.user(user) {
                Some(user) => report(
                    service.blacklist_remove(self.guild, self.actor, user).await,
                    |removed| {
                        if removed {
                            "removed from blacklist".to_string()
                        } else {
                            "was not blacklisted".to_string()
                        }
                    },
                ),
                None => println!("unknown user"),
            },
            _ => println!("usage: bl list|add|rm"),
        }
    }

    // ------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------

    fn user(&self, arg: &str) -> Option<UserId> {
        self.users
            .iter()
            .find(|(name, _)| name == arg)
            .map(|(_, id)| *id)
            .or_else(|| arg.parse().ok())
    }

    fn name_of(&self, id: UserId) -> String {
        self.users
            .iter()
            .find(|(_, user)| *user == id)
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    fn print_ticket(&self, ticket: &Ticket) {
        let claimed = ticket
            .claimed_by
            .map(|u| self.name_of(u))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "#{} channel {} requester {} category {} claimed_by {}",
            ticket.number,
            ticket.channel,
            self.name_of(ticket.requester),
            ticket.category,
            claimed
        );
        match (&ticket.close_reason, ticket.closed_by) {
            (Some(reason), Some(by)) => {
                println!("  closed by {} ({reason})", self.name_of(by));
            }
            _ => println!("  open since {}", ticket.created_at.format("%d.%m.%Y %H:%M")),
        }
    }
}

fn parse_channel(arg: &str) -> Option<ChannelId> {
    arg.parse().ok()
}

fn parse_message(arg: &str) -> Option<MessageId> {
    arg.parse().ok()
}

fn parse_flag(arg: &str) -> Option<bool> {
    match arg {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}

fn join_opt(parts: &[&str]) -> Option<String> {
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}
