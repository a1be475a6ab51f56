//! Command registry: keyword -> argument shape -> typed [`Command`].
//!
//! Keywords are looked up exactly, so `server` and `server-create` can never
//! shadow each other the way overlapping patterns would.

pub const PREFIX: &str = "openstack-compute";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Flavors,
    Flavor {
        id: String,
    },
    Servers {
        pattern: Option<String>,
    },
    Server {
        id: String,
    },
    ServerCreate {
        name: String,
        flavor: String,
        image: String,
        key_name: String,
    },
    ServerDelete {
        target: String,
    },
    Images,
    Image {
        id: String,
    },
    Help,
}

impl Command {
    pub fn keyword(&self) -> &'static str {
        match self {
            Command::Flavors => "flavors",
            Command::Flavor { .. } => "flavor",
            Command::Servers { .. } => "servers",
            Command::Server { .. } => "server",
            Command::ServerCreate { .. } => "server-create",
            Command::ServerDelete { .. } => "server-delete",
            Command::Images => "images",
            Command::Image { .. } => "image",
            Command::Help => "help",
        }
    }

    /// Whether the command talks to the provider (and so needs valid settings).
    pub fn is_remote(&self) -> bool {
        !matches!(self, Command::Help)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgShape {
    None,
    Exactly(usize),
    /// Zero tokens, or the rest of the line as one argument.
    OptionalRest,
}

impl ArgShape {
    fn accepts(&self, count: usize) -> bool {
        match self {
            ArgShape::None => count == 0,
            ArgShape::Exactly(n) => count == *n,
            ArgShape::OptionalRest => true,
        }
    }
}

pub struct CommandSpec {
    pub keyword: &'static str,
    pub usage: &'static str,
    pub description: &'static str,
    pub args: ArgShape,
    build: fn(Vec<String>) -> Command,
}

pub static REGISTRY: &[CommandSpec] = &[
    CommandSpec {
        keyword: "flavors",
        usage: "flavors",
        description: "Print a list of available flavors.",
        args: ArgShape::None,
        build: build_flavors,
    },
    CommandSpec {
        keyword: "flavor",
        usage: "flavor <id>",
        description: "Show details about the given flavor.",
        args: ArgShape::Exactly(1),
        build: build_flavor,
    },
    CommandSpec {
        keyword: "servers",
        usage: "servers [<name-pattern>]",
        description: "Print a list of all servers, optionally filtered by name.",
        args: ArgShape::OptionalRest,
        build: build_servers,
    },
    CommandSpec {
        keyword: "server",
        usage: "server <id>",
        description: "Show details about the given server.",
        args: ArgShape::Exactly(1),
        build: build_server,
    },
    CommandSpec {
        keyword: "server-create",
        usage: "server-create <server-name> <flavor-name> <image-name> <keyname>",
        description: "Creates a server with the options specified.",
        args: ArgShape::Exactly(4),
        build: build_server_create,
    },
    CommandSpec {
        keyword: "server-delete",
        usage: "server-delete <id>",
        description: "Deletes a server with specified id or name.",
        args: ArgShape::Exactly(1),
        build: build_server_delete,
    },
    CommandSpec {
        keyword: "images",
        usage: "images",
        description: "Print a list of available images to boot from.",
        args: ArgShape::None,
        build: build_images,
    },
    CommandSpec {
        keyword: "image",
        usage: "image <id>",
        description: "Show details about the given image.",
        args: ArgShape::Exactly(1),
        build: build_image,
    },
    CommandSpec {
        keyword: "help",
        usage: "help",
        description: "List the available commands.",
        args: ArgShape::None,
        build: build_help,
    },
];

pub fn lookup(keyword: &str) -> Option<&'static CommandSpec> {
    REGISTRY
        .iter()
        .find(|spec| spec.keyword.eq_ignore_ascii_case(keyword))
}

#[derive(Debug, PartialEq, Eq)]
pub enum Parsed {
    /// Not an `openstack-compute` message.
    Ignored,
    Command(Command),
    /// Known keyword, wrong number of arguments.
    Usage(&'static str),
    Unknown(String),
}

impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSpec")
            .field("keyword", &self.keyword)
            .field("args", &self.args)
            .finish()
    }
}

/// Parses a raw chat line. An optional leading bot name (`hubot`, `hubot:`, `@hubot`) is skipped.
pub fn parse(text: &str, bot_name: &str) -> Parsed {
    let mut tokens: Vec<&str> = text.split_whitespace().collect();
    if let Some(first) = tokens.first() {
        let addressed = first
            .trim_start_matches('@')
            .trim_end_matches([':', ','])
            .eq_ignore_ascii_case(bot_name);
        if addressed {
            tokens.remove(0);
        }
    }

    match tokens.first() {
        Some(prefix) if prefix.eq_ignore_ascii_case(PREFIX) => {}
        _ => return Parsed::Ignored,
    }
    let Some(keyword) = tokens.get(1) else {
        return Parsed::Unknown(String::new());
    };
    let Some(spec) = lookup(keyword) else {
        return Parsed::Unknown(keyword.to_string());
    };

    let args: Vec<String> = tokens[2..].iter().map(|s| s.to_string()).collect();
    if !spec.args.accepts(args.len()) {
        return Parsed::Usage(spec.usage);
    }
    let args = match spec.args {
        ArgShape::OptionalRest if !args.is_empty() => vec![args.join(" ")],
        _ => args,
    };
    Parsed::Command((spec.build)(args))
}

/// One line per registered command, for the `help` reply.
pub fn help_text() -> String {
    REGISTRY
        .iter()
        .map(|spec| format!("{} {} - {}\n", PREFIX, spec.usage, spec.description))
        .collect()
}

fn build_flavors(_: Vec<String>) -> Command {
    Command::Flavors
}

fn build_flavor(args: Vec<String>) -> Command {
    let mut args = args.into_iter();
    Command::Flavor {
        id: args.next().unwrap_or_default(),
    }
}

fn build_servers(args: Vec<String>) -> Command {
    Command::Servers {
        pattern: args.into_iter().next(),
    }
}

fn build_server(args: Vec<String>) -> Command {
    let mut args = args.into_iter();
    Command::Server {
        id: args.next().unwrap_or_default(),
    }
}

fn build_server_create(args: Vec<String>) -> Command {
    let mut args = args.into_iter();
    Command::ServerCreate {
        name: args.next().unwrap_or_default(),
        flavor: args.next().unwrap_or_default(),
        image: args.next().unwrap_or_default(),
        key_name: args.next().unwrap_or_default(),
    }
}

fn build_server_delete(args: Vec<String>) -> Command {
    let mut args = args.into_iter();
    Command::ServerDelete {
        target: args.next().unwrap_or_default(),
    }
}

fn build_images(_: Vec<String>) -> Command {
    Command::Images
}

fn build_image(args: Vec<String>) -> Command {
    let mut args = args.into_iter();
    Command::Image {
        id: args.next().unwrap_or_default(),
    }
}

fn build_help(_: Vec<String>) -> Command {
    Command::Help
}
