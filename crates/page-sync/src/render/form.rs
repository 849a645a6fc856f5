use std::collections::BTreeMap;

use crate::model::tree::find_by_id;
use crate::model::{FormValidator, FormValues, InputValidator, Node};

/// Collects the validators of every input named in `values`.
pub fn input_validators(tree: &Node, values: &FormValues) -> Vec<(String, InputValidator)> {
    values
        .keys()
        .filter_map(|id| {
            let input = find_by_id(tree, id)?.as_input()?;
            let validator = input.hooks.validate.clone()?;
            Some((id.clone(), validator))
        })
        .collect()
}

/// Runs input validators in order. Returns `None` when every input passed.
pub async fn input_errors(
    validators: Vec<(String, InputValidator)>,
    values: &FormValues,
) -> Option<BTreeMap<String, String>> {
    let mut errors = BTreeMap::new();
    for (id, validator) in validators {
        let Some(value) = values.get(&id).cloned() else {
            continue;
        };
        if let Some(message) = validator(value).await.error_message() {
            errors.insert(id, message);
        }
    }
    if errors.is_empty() { None } else { Some(errors) }
}

pub async fn form_error(validator: Option<FormValidator>, values: &FormValues) -> Option<String> {
    let validator = validator?;
    validator(values.clone()).await.error_message()
}
