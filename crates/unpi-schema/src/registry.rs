use std::collections::{BTreeMap, HashMap};

use serde_json::{json, Value};
use tracing::{debug, warn};
use unpi_frame::{Frame, UnpiType};

use crate::catalog::{self, SchemaDef, SubsystemDef};
use crate::config::RegistryConfig;
use crate::error::{Result, SchemaError};
use crate::message::{Message, MessageKey, Originator};
use crate::payload::{decode_payload, Payload, PayloadKind, RawPayload};
use crate::types::DeviceAddress;
use crate::validator::RequestValidator;

/// Registry of message schemas keyed by originator, request type, subsystem,
/// and command.
///
/// Built once at startup and shared read-only afterwards. The same table is
/// used to decode inbound frames and to build outbound commands by name.
pub struct MessageRegistry {
    subsystems: BTreeMap<u8, SubsystemDef>,
    schemas: HashMap<MessageKey, SchemaDef>,
    validator: RequestValidator,
    config: RegistryConfig,
}

impl MessageRegistry {
    /// Create an empty registry with default config.
    pub fn new() -> Result<Self> {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry with explicit config.
    pub fn with_config(config: RegistryConfig) -> Result<Self> {
        Ok(Self {
            subsystems: BTreeMap::new(),
            schemas: HashMap::new(),
            validator: RequestValidator::new()?,
            config,
        })
    }

    /// Registry with the RTLS and UTIL subsystems loaded.
    pub fn standard() -> Result<Self> {
        Self::standard_with_config(RegistryConfig::default())
    }

    /// Registry with the RTLS and UTIL subsystems loaded and explicit config.
    pub fn standard_with_config(config: RegistryConfig) -> Result<Self> {
        let mut registry = Self::with_config(config)?;
        registry.register_subsystem(catalog::rtls())?;
        registry.register_subsystem(catalog::util())?;
        Ok(registry)
    }

    /// Register a subsystem and every schema it declares.
    pub fn register_subsystem(&mut self, def: SubsystemDef) -> Result<()> {
        if self.subsystems.contains_key(&def.id) {
            return Err(SchemaError::DuplicateSchema(format!(
                "subsystem {} (0x{:02X})",
                def.name, def.id
            )));
        }
        let id = def.id;
        let schemas = def.schemas;
        self.subsystems.insert(id, def);
        for schema in schemas {
            self.register(id, *schema)?;
        }
        Ok(())
    }

    /// Register one additional schema under an already registered subsystem.
    pub fn register(&mut self, subsystem: u8, schema: SchemaDef) -> Result<()> {
        if !self.subsystems.contains_key(&subsystem) {
            return Err(SchemaError::UnknownSubsystem(format!("0x{subsystem:02X}")));
        }
        let key = schema.key(subsystem);
        if self.schemas.contains_key(&key) {
            return Err(SchemaError::DuplicateSchema(key.to_string()));
        }
        self.schemas.insert(key, schema);
        Ok(())
    }

    /// Schema registered for a key.
    pub fn schema(&self, key: &MessageKey) -> Option<&SchemaDef> {
        self.schemas.get(key)
    }

    /// A registered subsystem.
    pub fn subsystem(&self, id: u8) -> Option<&SubsystemDef> {
        self.subsystems.get(&id)
    }

    /// All registered subsystems, ordered by id.
    pub fn subsystems(&self) -> impl Iterator<Item = &SubsystemDef> {
        self.subsystems.values()
    }

    /// Ids of all registered subsystems.
    pub fn subsystem_ids(&self) -> Vec<u8> {
        self.subsystems.keys().copied().collect()
    }

    /// Name of a command within a subsystem.
    pub fn command_name(&self, subsystem: u8, command: u8) -> Option<&'static str> {
        self.subsystems
            .get(&subsystem)
            .and_then(|def| def.command_name(command))
    }

    /// Host-originated schemas of a subsystem, ordered by command.
    pub fn requests(&self, subsystem: u8) -> Vec<&SchemaDef> {
        let mut requests: Vec<&SchemaDef> = self
            .schemas
            .iter()
            .filter(|(key, schema)| {
                key.subsystem == subsystem && schema.originator == Originator::Ap
            })
            .map(|(_, schema)| schema)
            .collect();
        requests.sort_by_key(|schema| (schema.command, schema.unpi_type));
        requests
    }

    /// Get registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Decode a frame received from `originator`.
    ///
    /// Never fails: payloads that do not fit their schema decode to an empty
    /// payload, and frames without a schema keep their bytes as a raw payload.
    pub fn decode(&self, originator: Originator, frame: &Frame) -> Message {
        let key = MessageKey {
            originator,
            unpi_type: frame.unpi_type,
            subsystem: frame.subsystem,
            command: frame.command,
        };

        let payload = match self.schemas.get(&key) {
            Some(schema) => match decode_payload(
                schema.kind,
                frame.payload.as_ref(),
                self.config.reject_trailing_bytes,
            ) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(%key, schema = schema.name, error = %err, "payload does not fit schema");
                    Payload::default()
                }
            },
            None => {
                debug!(%key, len = frame.payload.len(), "no schema registered, keeping raw payload");
                Payload::Raw(RawPayload {
                    raw_payload: frame.payload.to_vec(),
                })
            }
        };

        Message {
            originator,
            unpi_type: frame.unpi_type,
            subsystem: frame.subsystem,
            command: frame.command,
            payload,
            raw: Some(frame.clone()),
        }
    }

    /// Build a host request by subsystem and command name.
    ///
    /// `args` may be an object of named fields, an array of positional fields
    /// in wire order, or `null` for commands without arguments.
    pub fn build_command(&self, subsystem: &str, command: &str, args: Value) -> Result<Message> {
        let subsystem_id = self.resolve_subsystem(&Value::from(subsystem))?;
        let command_id = self.resolve_command(subsystem_id, &Value::from(command))?;
        self.build(Originator::Ap, UnpiType::SyncReq, subsystem_id, command_id, args)
    }

    /// Textual form of a message:
    /// `{"originator", "type", "subsystem", "command", "payload"}`.
    pub fn to_json(&self, message: &Message) -> Value {
        let subsystem = match self.subsystems.get(&message.subsystem) {
            Some(def) => Value::from(def.name),
            None => Value::from(message.subsystem),
        };
        let command = match self.command_name(message.subsystem, message.command) {
            Some(name) => Value::from(name),
            None => Value::from(message.command),
        };
        json!({
            "originator": message.originator.name(),
            "type": message.unpi_type.name(),
            "subsystem": subsystem,
            "command": command,
            "payload": message.payload.to_value(),
        })
    }

    /// Parse a message from its textual form.
    ///
    /// Subsystem and command may be given by name or number. A command
    /// number without a schema is accepted with a raw payload.
    pub fn from_json(&self, value: &Value) -> Result<Message> {
        if self.config.validate_requests {
            self.validator.validate_message(value)?;
        }

        let originator = match value.get("originator").and_then(Value::as_str) {
            None | Some("Ap") => Originator::Ap,
            Some("Nwp") => Originator::Nwp,
            Some(other) => {
                return Err(SchemaError::InvalidValue {
                    field: "originator",
                    value: other.to_string(),
                })
            }
        };
        let type_name = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or(UnpiType::SyncReq.name());
        let unpi_type: UnpiType = type_name.parse().map_err(|_| SchemaError::InvalidValue {
            field: "type",
            value: type_name.to_string(),
        })?;
        let subsystem = self.resolve_subsystem(value.get("subsystem").unwrap_or(&Value::Null))?;
        let command_value = value.get("command").unwrap_or(&Value::Null);
        let command = self.resolve_command(subsystem, command_value)?;
        let args = value.get("payload").cloned().unwrap_or(Value::Null);

        self.build(originator, unpi_type, subsystem, command, args)
    }

    /// Parse a textual command request.
    pub fn parse_request(&self, text: &str) -> Result<Message> {
        let value: Value = serde_json::from_str(text)?;
        self.from_json(&value)
    }

    /// Parse an `{"identifier", "message"}` envelope addressed to one device.
    pub fn parse_addressed(&self, value: &Value) -> Result<(DeviceAddress, Message)> {
        if self.config.validate_requests {
            self.validator.validate_addressed(value)?;
        }
        let identifier = value
            .get("identifier")
            .and_then(Value::as_str)
            .ok_or_else(|| SchemaError::InvalidValue {
                field: "identifier",
                value: "missing".to_string(),
            })?
            .parse::<DeviceAddress>()?;
        let message = self.from_json(value.get("message").unwrap_or(&Value::Null))?;
        Ok((identifier, message))
    }

    fn build(
        &self,
        originator: Originator,
        unpi_type: UnpiType,
        subsystem: u8,
        command: u8,
        args: Value,
    ) -> Result<Message> {
        let key = MessageKey {
            originator,
            unpi_type,
            subsystem,
            command,
        };
        let kind = match self.schemas.get(&key) {
            Some(schema) => schema.kind,
            None if self.command_name(subsystem, command).is_none() => PayloadKind::Raw,
            None => return Err(SchemaError::NoSchema(key.to_string())),
        };
        let payload = kind
            .from_json(args)
            .map_err(|err| SchemaError::InvalidArguments {
                command: self.describe(&key),
                message: err.to_string(),
            })?;
        Ok(Message::new(originator, unpi_type, subsystem, command, payload))
    }

    fn describe(&self, key: &MessageKey) -> String {
        match self.command_name(key.subsystem, key.command) {
            Some(name) => format!("{} {name}", key.unpi_type),
            None => key.to_string(),
        }
    }

    fn resolve_subsystem(&self, value: &Value) -> Result<u8> {
        let id = match value {
            Value::String(name) => self
                .subsystems
                .values()
                .find(|def| def.name == name.as_str())
                .map(|def| def.id)
                .or_else(|| unpi_frame::subsystem_id(name)),
            Value::Number(number) => number.as_u64().and_then(|n| u8::try_from(n).ok()),
            _ => None,
        };
        match id {
            Some(id) if self.subsystems.contains_key(&id) => Ok(id),
            _ => Err(SchemaError::UnknownSubsystem(display_value(value))),
        }
    }

    fn resolve_command(&self, subsystem: u8, value: &Value) -> Result<u8> {
        let def = self
            .subsystems
            .get(&subsystem)
            .ok_or_else(|| SchemaError::UnknownSubsystem(format!("0x{subsystem:02X}")))?;
        let id = match value {
            Value::String(name) => def.command_id(name),
            Value::Number(number) => number.as_u64().and_then(|n| u8::try_from(n).ok()),
            _ => None,
        };
        id.ok_or_else(|| SchemaError::UnknownCommand {
            subsystem: def.name.to_string(),
            command: display_value(value),
        })
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
