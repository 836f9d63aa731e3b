//! Default prompt templates bundled at compile time.
//!
//! User templates carry an `{input}` placeholder that is filled per call.

/// Diversifier - finds cultural variants of a dish concept
pub const DIVERSIFIER_SYSTEM: &str = include_str!("defaults/diversifier_system.md");

/// Diversifier user instruction; `{input}` is the dish concept
pub const DIVERSIFIER_USER: &str = include_str!("defaults/diversifier_user.md");

/// Recipes - structures one recipe per candidate
pub const RECIPES_SYSTEM: &str = include_str!("defaults/recipes_system.md");

/// Recipes user instruction; `{input}` is the JSON array of lookup items
pub const RECIPES_USER: &str = include_str!("defaults/recipes_user.md");

const INPUT_PLACEHOLDER: &str = "{input}";

/// Fill the `{input}` placeholder of a user template
pub fn render(template: &str, input: &str) -> String {
    template.replace(INPUT_PLACEHOLDER, input)
}
