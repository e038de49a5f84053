/// Creates a [`PluginBundle`](crate::plugin::PluginBundle) from a name and a
/// list of handler groups.
///
/// ```rust,ignore
/// let admin = plugin! {
///     name: "admin",
///     groups: [
///         on_command("ban").handler(handler_fn(ban)).build()?,
///         on_command("kick").handler(handler_fn(kick)).build()?,
///     ],
/// };
/// ```
///
/// `groups` may be omitted for a plugin that contributes nothing yet.
#[macro_export]
macro_rules! plugin {
    (name: $name:expr $(,)?) => {
        $crate::plugin::PluginBundle::new($name)
    };

    (name: $name:expr, groups: [$($group:expr),* $(,)?] $(,)?) => {
        $crate::plugin::PluginBundle::new($name)
            .with_groups(::std::vec![$($group),*])
    };
}
