//! Subcommand drivers
//!
//! Exit code contract: 0 on success, -1 on client-side errors (argument
//! validation, unknown tool/prompt), and 1 on protocol errors reported by
//! the server.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{json, Map, Value};
use tokio::io::AsyncWriteExt;

use flowmcp_protocol::schema::{ParamKind, Prototype};

use crate::cli::{Cli, Commands, Connection, PromptsCommand, ResourcesCommand, ToolsCommand};
use crate::client::{Client, CliError};

/// Run one parsed command and return its exit code
pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Commands::Info(conn) => info(conn).await,
        Commands::Tools(ToolsCommand::List(conn)) => tools_list(conn).await,
        Commands::Tools(ToolsCommand::Call { conn, method, params }) => {
            tools_call(conn, method, params).await
        }
        Commands::Resources(ResourcesCommand::List(conn)) => resources_list(conn).await,
        Commands::Resources(ResourcesCommand::Templates(conn)) => resources_templates(conn).await,
        Commands::Resources(ResourcesCommand::Describe { conn, uri, n }) => {
            resources_describe(conn, uri, n).await
        }
        Commands::Resources(ResourcesCommand::Read { conn, uri, n }) => {
            resources_read(conn, uri, n).await
        }
        Commands::Prompts(PromptsCommand::List(conn)) => prompts_list(conn).await,
        Commands::Prompts(PromptsCommand::Get { conn, prompt, params }) => {
            prompts_get(conn, prompt, params).await
        }
    }
}

async fn connect(conn: &Connection) -> Result<Client, CliError> {
    Client::connect(&conn.url, conn.root_pairs()).await
}

async fn info(conn: Connection) -> anyhow::Result<i32> {
    let client = connect(&conn).await?;
    print!("{}", to_yaml(&client.server_info));

    Ok(0)
}

// --- tools ---------------------------------------------------------------

async fn fetch_tools(client: &mut Client) -> Result<BTreeMap<String, Prototype>, CliError> {
    let result = client.send("tools/list", json!({})).await?;

    let mut tools = BTreeMap::new();
    for tool in result["tools"].as_array().into_iter().flatten() {
        let name = tool["name"].as_str().unwrap_or_default();
        let description = tool["description"].as_str().unwrap_or_default();
        let schema = tool.get("inputSchema").cloned().unwrap_or_else(|| json!({}));

        let proto = Prototype::from_input_schema(name, description, &schema)
            .map_err(|error| CliError::Transport(error.to_string()))?;
        tools.insert(name.to_owned(), proto);
    }

    Ok(tools)
}

async fn tools_list(conn: Connection) -> anyhow::Result<i32> {
    let mut client = connect(&conn).await?;
    let tools = fetch_tools(&mut client).await?;

    println!("Available tools:\n");
    for proto in tools.values() {
        print_prototype(proto);
    }

    Ok(0)
}

async fn tools_call(conn: Connection, method: String, params: Vec<String>) -> anyhow::Result<i32> {
    let mut client = connect(&conn).await?;
    let tools = fetch_tools(&mut client).await?;

    let Some(proto) = tools.get(&method) else {
        println!("Error: tool not found!");
        return Ok(-1);
    };
    let args = match parse_args(proto, &params) {
        Ok(args) => args,
        Err(error) => {
            println!("Error: {error}");
            return Ok(-1);
        }
    };

    let result = match client
        .send("tools/call", json!({"name": method, "arguments": args}))
        .await
    {
        Ok(result) => result,
        Err(CliError::Rpc { code, message }) => {
            println!("Protocol Error: {message} ({code})");
            return Ok(1);
        }
        Err(error) => return Err(error.into()),
    };

    if result["isError"].as_bool().unwrap_or(false) {
        println!(
            "Call Error: {}",
            result["content"][0]["text"].as_str().unwrap_or_default()
        );
    } else {
        print!("{}", to_yaml(&result["content"]));
    }

    Ok(0)
}

// --- resources -----------------------------------------------------------

async fn resources_list(conn: Connection) -> anyhow::Result<i32> {
    let mut client = connect(&conn).await?;
    let result = client.send("resources/list", json!({})).await?;

    println!("Available resources:\n");
    for resource in result["resources"].as_array().into_iter().flatten() {
        println!(
            " - {} {} {} {}",
            resource["uri"].as_str().unwrap_or_default(),
            resource["name"].as_str().unwrap_or_default(),
            resource["mimeType"].as_str().unwrap_or_default(),
            resource["description"].as_str().unwrap_or_default(),
        );
    }

    Ok(0)
}

async fn resources_templates(conn: Connection) -> anyhow::Result<i32> {
    let mut client = connect(&conn).await?;
    let result = client.send("resources/templates/list", json!({})).await?;

    println!("Available resource templates:\n");
    for template in result["resourceTemplates"].as_array().into_iter().flatten() {
        println!(
            " - {} {} {} {}",
            template["uriTemplate"].as_str().unwrap_or_default(),
            template["name"].as_str().unwrap_or_default(),
            template["mimeType"].as_str().unwrap_or_default(),
            template["description"].as_str().unwrap_or_default(),
        );
    }

    Ok(0)
}

async fn read_content(
    client: &mut Client,
    uri: &str,
    n: usize,
) -> Result<Result<(Value, usize), i32>, CliError> {
    let result = match client.send("resources/read", json!({"uri": uri})).await {
        Ok(result) => result,
        Err(CliError::Rpc { code, message }) => {
            println!("Protocol Error: {message} ({code})");
            return Ok(Err(1));
        }
        Err(error) => return Err(error.into()),
    };

    let contents = result["contents"].as_array().cloned().unwrap_or_default();
    let Some(content) = n.checked_sub(1).and_then(|index| contents.get(index)) else {
        println!("Error: resource has {} content(s), not {n}", contents.len());
        return Ok(Err(-1));
    };

    Ok(Ok((content.clone(), contents.len())))
}

async fn resources_describe(conn: Connection, uri: String, n: usize) -> anyhow::Result<i32> {
    let mut client = connect(&conn).await?;
    let (mut content, count) = match read_content(&mut client, &uri, n).await? {
        Ok(content) => content,
        Err(code) => return Ok(code),
    };

    let length = match (content.get("blob"), content.get("text")) {
        (Some(blob), _) => {
            let blob = blob.as_str().unwrap_or_default();
            BASE64
                .decode(blob)
                .map_err(|error| CliError::Transport(format!("invalid blob: {error}")))?
                .len()
        }
        (None, Some(text)) => text.as_str().unwrap_or_default().len(),
        (None, None) => 0,
    };

    if let Some(description) = content.as_object_mut() {
        description.remove("blob");
        description.remove("text");
        description.insert("contents".to_owned(), json!(count));
        description.insert("length".to_owned(), json!(length));
    }
    print!("{}", to_yaml(&content));

    Ok(0)
}

async fn resources_read(conn: Connection, uri: String, n: usize) -> anyhow::Result<i32> {
    let mut client = connect(&conn).await?;
    let (content, _) = match read_content(&mut client, &uri, n).await? {
        Ok(content) => content,
        Err(code) => return Ok(code),
    };

    match content.get("blob") {
        Some(blob) => {
            let data = BASE64
                .decode(blob.as_str().unwrap_or_default())
                .map_err(|error| CliError::Transport(format!("invalid blob: {error}")))?;

            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(&data)
                .await
                .map_err(|error| CliError::Transport(error.to_string()))?;
            stdout
                .flush()
                .await
                .map_err(|error| CliError::Transport(error.to_string()))?;
        }
        None => println!("{}", content["text"].as_str().unwrap_or_default()),
    }

    Ok(0)
}

// --- prompts -------------------------------------------------------------

async fn fetch_prompts(client: &mut Client) -> Result<BTreeMap<String, Prototype>, CliError> {
    let result = client.send("prompts/list", json!({})).await?;

    let mut prompts = BTreeMap::new();
    for prompt in result["prompts"].as_array().into_iter().flatten() {
        let name = prompt["name"].as_str().unwrap_or_default();
        let description = prompt["description"].as_str().unwrap_or_default();

        // Prompt arguments are untyped on the wire; treat them as strings.
        let mut proto = Prototype::new(name, description);
        for argument in prompt["arguments"].as_array().into_iter().flatten() {
            let arg_name = argument["name"].as_str().unwrap_or_default();
            proto = if argument["required"].as_bool().unwrap_or(false) {
                proto.required(arg_name, ParamKind::String)
            } else {
                proto.optional(arg_name, ParamKind::String, None)
            };
        }

        prompts.insert(name.to_owned(), proto);
    }

    Ok(prompts)
}

async fn prompts_list(conn: Connection) -> anyhow::Result<i32> {
    let mut client = connect(&conn).await?;
    let prompts = fetch_prompts(&mut client).await?;

    println!("Available prompts:\n");
    for proto in prompts.values() {
        print_prototype(proto);
    }

    Ok(0)
}

async fn prompts_get(conn: Connection, prompt: String, params: Vec<String>) -> anyhow::Result<i32> {
    let mut client = connect(&conn).await?;
    let prompts = fetch_prompts(&mut client).await?;

    let Some(proto) = prompts.get(&prompt) else {
        println!("Error: prompt not found!");
        return Ok(-1);
    };
    let args = match parse_args(proto, &params) {
        Ok(args) => args,
        Err(error) => {
            println!("Error: {error}");
            return Ok(-1);
        }
    };

    let result = match client
        .send("prompts/get", json!({"name": prompt, "arguments": args}))
        .await
    {
        Ok(result) => result,
        Err(CliError::Rpc { code, message }) => {
            println!("Protocol Error: {message} ({code})");
            return Ok(1);
        }
        Err(error) => return Err(error.into()),
    };
    print!("{}", to_yaml(&result["messages"]));

    Ok(0)
}

// --- shared helpers ------------------------------------------------------

/// Coerce and validate `name=value` pairs against a prototype
fn parse_args(proto: &Prototype, params: &[String]) -> Result<Map<String, Value>, String> {
    let mut args = Map::new();
    for param in params {
        let (name, value) = param
            .split_once('=')
            .ok_or_else(|| format!("invalid parameter `{param}`, expected name=value"))?;
        args.insert(name.to_owned(), proto.coerce(name, value)?);
    }
    proto.validate(&args)?;

    Ok(args)
}

fn print_prototype(proto: &Prototype) {
    println!(" - {}", proto.signature());
    if !proto.description.is_empty() {
        println!("      {}", proto.description);
    }
}

fn to_yaml(value: &Value) -> String {
    serde_yaml::to_string(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn proto() -> Prototype {
        Prototype::new("get_temperature", "")
            .required("city", ParamKind::String)
            .optional("days", ParamKind::Integer, None)
    }

    #[test]
    fn args_are_coerced_through_the_prototype() {
        let args = parse_args(&proto(), &["city=london".to_owned(), "days=3".to_owned()]).unwrap();
        assert_eq!(Value::Object(args), json!({"city": "london", "days": 3}));
    }

    #[test]
    fn bad_args_fail_client_side() {
        assert!(parse_args(&proto(), &["city".to_owned()]).is_err());
        assert!(parse_args(&proto(), &["days=soon".to_owned()]).is_err());
        assert!(parse_args(&proto(), &["country=uk".to_owned()]).is_err());
        assert!(parse_args(&proto(), &[]).is_err()); // missing required city
    }
}
