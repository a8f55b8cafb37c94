use toml::Value;

use banter_config::{Config, Error};

const SAMPLE_CONFIG_TOML: &str = include_str!("fixtures/sample_config.toml");

fn sample_config() -> Value {
	toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse sample config.")
}

fn parse(value: Value) -> Config {
	value.try_into().expect("Failed to deserialize config.")
}

fn set(value: &mut Value, table: &str, key: &str, new: Value) {
	let table = value
		.get_mut(table)
		.and_then(Value::as_table_mut)
		.expect("Sample config must include the table.");

	table.insert(key.to_string(), new);
}

#[test]
fn sample_config_validates() {
	let cfg = parse(sample_config());

	banter_config::validate(&cfg).expect("Sample config must validate.");
}

#[test]
fn zero_top_k_is_rejected() {
	let mut value = sample_config();

	set(&mut value, "retrieval", "top_k", Value::Integer(0));

	let cfg = parse(value);

	assert!(matches!(banter_config::validate(&cfg), Err(Error::Validation { .. })));
}

#[test]
fn zero_retry_attempts_are_rejected() {
	let mut value = sample_config();

	set(&mut value, "retry", "max_attempts", Value::Integer(0));

	let cfg = parse(value);

	assert!(matches!(banter_config::validate(&cfg), Err(Error::Validation { .. })));
}

#[test]
fn backoff_bounds_must_be_ordered() {
	let mut value = sample_config();

	set(&mut value, "retry", "max_delay_ms", Value::Integer(10));

	let cfg = parse(value);

	assert!(matches!(banter_config::validate(&cfg), Err(Error::Validation { .. })));
}

#[test]
fn empty_provider_key_is_rejected() {
	let mut value = sample_config();
	let embedding = value
		.get_mut("providers")
		.and_then(Value::as_table_mut)
		.and_then(|providers| providers.get_mut("embedding"))
		.and_then(Value::as_table_mut)
		.expect("Sample config must include [providers.embedding].");

	embedding.insert("api_key".to_string(), Value::String(" ".to_string()));

	let cfg = parse(value);

	assert!(matches!(banter_config::validate(&cfg), Err(Error::Validation { .. })));
}

#[test]
fn zero_embedding_batch_size_is_rejected() {
	let mut value = sample_config();
	let embedding = value
		.get_mut("providers")
		.and_then(Value::as_table_mut)
		.and_then(|providers| providers.get_mut("embedding"))
		.and_then(Value::as_table_mut)
		.expect("Sample config must include [providers.embedding].");

	embedding.insert("batch_size".to_string(), Value::Integer(0));

	let cfg = parse(value);

	assert!(matches!(banter_config::validate(&cfg), Err(Error::Validation { .. })));
}
