//! Paginated, filterable keyed-action dialogs.
//!
//! A [`Menu`] only lives for one pass of [`exec_menu`]: the builder callback runs again before
//! every redisplay, so the actions always reflect current world state.

use crate::session::errors::{MenuError, SessionError};
use crate::session::terminal::Terminal;
use crate::world::Id;

const DECORATOR: &str = "-=-=-";
const FILTER_PREFIX: char = '/';

type Handler<'a> = Box<dyn FnMut(&mut MenuControl) -> Result<(), SessionError> + Send + 'a>;
type ExitHandler<'a> = Box<dyn FnOnce() + Send + 'a>;

/// Passed to action handlers so they can close the dialog.
#[derive(Debug, Default)]
pub struct MenuControl {
    exit: bool,
}

impl MenuControl {
    pub fn exit(&mut self) {
        self.exit = true;
    }
}

/// The action whose handler closed the menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuChoice {
    pub key: String,
    pub data: Option<Id>,
}

struct Action<'a> {
    key: String,
    text: String,
    data: Option<Id>,
    handler: Handler<'a>,
}

pub struct Menu<'a> {
    title: String,
    actions: Vec<Action<'a>>,
    on_exit: Option<ExitHandler<'a>>,
}

impl<'a> Menu<'a> {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            actions: Vec::new(),
            on_exit: None,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    /// Register an action. Keys are case-insensitive and must be unique within the menu.
    pub fn add_action<F>(&mut self, key: &str, text: &str, handler: F) -> Result<(), MenuError>
    where
        F: FnMut(&mut MenuControl) -> Result<(), SessionError> + Send + 'a,
    {
        self.push(key, text, None, Box::new(handler))
    }

    /// Like [`Menu::add_action`], carrying an id the caller can read back with
    /// [`Menu::get_data`] or from the returned [`MenuChoice`].
    pub fn add_data_action<F>(
        &mut self,
        key: &str,
        text: &str,
        data: Id,
        handler: F,
    ) -> Result<(), MenuError>
    where
        F: FnMut(&mut MenuControl) -> Result<(), SessionError> + Send + 'a,
    {
        self.push(key, text, Some(data), Box::new(handler))
    }

    /// Register an action keyed by its one-based position.
    pub fn add_action_indexed<F>(
        &mut self,
        index: usize,
        text: &str,
        handler: F,
    ) -> Result<(), MenuError>
    where
        F: FnMut(&mut MenuControl) -> Result<(), SessionError> + Send + 'a,
    {
        self.add_action(&(index + 1).to_string(), text, handler)
    }

    fn push(
        &mut self,
        key: &str,
        text: &str,
        data: Option<Id>,
        handler: Handler<'a>,
    ) -> Result<(), MenuError> {
        if self.has_action(key) {
            return Err(MenuError::DuplicateKey {
                key: key.to_string(),
                text: text.to_string(),
            });
        }
        self.actions.push(Action {
            key: key.to_lowercase(),
            text: text.to_string(),
            data,
            handler,
        });
        Ok(())
    }

    /// Run `handler` when the menu is left, whether by empty input or by an action calling
    /// [`MenuControl::exit`].
    pub fn on_exit<F>(&mut self, handler: F)
    where
        F: FnOnce() + Send + 'a,
    {
        self.on_exit = Some(Box::new(handler));
    }

    fn find(&self, key: &str) -> Option<usize> {
        let key = key.to_lowercase();
        self.actions.iter().position(|action| action.key == key)
    }

    pub fn has_action(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    pub fn get_data(&self, key: &str) -> Option<Id> {
        self.find(key).and_then(|index| self.actions[index].data)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    fn finish(self) {
        if let Some(handler) = self.on_exit {
            handler();
        }
    }

    /// Display lines for the actions whose text contains `filter`, ignoring case.
    fn option_lines(&self, filter: &str) -> Vec<String> {
        let filter = filter.to_lowercase();
        self.actions
            .iter()
            .filter(|action| action.text.to_lowercase().contains(&filter))
            .map(|action| format!("  {}", highlight_key(&action.text, &action.key)))
            .collect()
    }
}

/// Bracket the key where it appears in the text ("[N]orth"), or prefix it ("[NE]Northeast").
fn highlight_key(text: &str, key: &str) -> String {
    let found = if text.is_ascii() {
        text.to_ascii_lowercase().find(key)
    } else {
        None
    };
    match found {
        Some(index) => {
            let end = index + key.len();
            format!("{}[{}]{}", &text[..index], &text[index..end], &text[end..])
        }
        None => format!("[{}]{}", key.to_uppercase(), text),
    }
}

/// Pack lines into pages of at most `rows_per_page` terminal rows. A line longer than `width`
/// takes as many rows as it wraps onto. There is always at least one (possibly empty) page.
pub fn paginate(lines: &[String], width: usize, rows_per_page: usize) -> Vec<String> {
    let width = width.max(1);
    let rows_per_page = rows_per_page.max(1);
    let mut pages = Vec::new();
    let mut page = String::new();
    let mut used = 0;
    for line in lines {
        let rows = line.chars().count().div_ceil(width).max(1);
        if used > 0 && used + rows > rows_per_page {
            pages.push(std::mem::take(&mut page));
            used = 0;
        }
        page.push_str(line);
        page.push_str("\r\n");
        used += rows;
    }
    if used > 0 || pages.is_empty() {
        pages.push(page);
    }
    pages
}

pub fn header(title: &str, filter: &str) -> String {
    let header = format!("{} {} {}", DECORATOR, title, DECORATOR);
    if filter.is_empty() {
        header
    } else {
        format!("{} ({}{})", header, FILTER_PREFIX, filter)
    }
}

pub fn page_prompt(page: usize, page_count: usize) -> String {
    if page_count > 1 {
        format!("Page {} of {} (<, >, <<, >>)\r\n> ", page + 1, page_count)
    } else {
        "> ".to_string()
    }
}

/// Run a menu dialog until the player leaves it.
///
/// Returns the choice whose handler called [`MenuControl::exit`], or `None` when the player
/// entered an empty line. A builder error aborts the dialog.
pub async fn exec_menu<'a, T, F>(
    title: &str,
    terminal: &mut T,
    mut build: F,
) -> Result<Option<MenuChoice>, SessionError>
where
    T: Terminal + ?Sized,
    F: FnMut(&mut Menu<'a>) -> Result<(), MenuError> + Send,
{
    let mut page = 0usize;
    let mut filter = String::new();

    loop {
        let mut menu = Menu::new(title);
        build(&mut menu)?;

        let options = menu.option_lines(&filter);
        let (width, height) = terminal.window_size();
        let pages = paginate(&options, width, height / 2);
        page = page.min(pages.len() - 1);

        terminal.write_line(&header(menu.title(), &filter)).await?;
        if options.is_empty() && !filter.is_empty() {
            terminal.write_line("No items match your search").await?;
        } else {
            terminal.write(&pages[page]).await?;
        }

        let input = terminal.get_input(&page_prompt(page, pages.len())).await?;
        match input.as_str() {
            "" => {
                menu.finish();
                return Ok(None);
            }
            ">" => page = page.saturating_add(1),
            "<" => page = page.saturating_sub(1),
            ">>" => page = pages.len() - 1,
            "<<" => page = 0,
            text if text.starts_with(FILTER_PREFIX) => {
                filter = text[FILTER_PREFIX.len_utf8()..].to_string();
            }
            key => match menu.find(key) {
                Some(index) => {
                    let mut control = MenuControl::default();
                    let action = &mut menu.actions[index];
                    (action.handler)(&mut control)?;
                    if control.exit {
                        let choice = MenuChoice {
                            key: action.key.clone(),
                            data: action.data,
                        };
                        menu.finish();
                        return Ok(Some(choice));
                    }
                }
                None if key == "?" || key.eq_ignore_ascii_case("help") => {}
                None => terminal.write_line("Invalid selection").await?,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::ScriptedTerminal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn lines(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("  item {}", i)).collect()
    }

    #[test]
    fn duplicate_keys_are_rejected_ignoring_case() {
        let mut menu = Menu::new("Test");
        menu.add_action("a", "Alpha", |_| Ok(())).unwrap();
        let err = menu.add_action("A", "Another", |_| Ok(())).unwrap_err();
        assert_eq!(
            err,
            MenuError::DuplicateKey {
                key: "A".into(),
                text: "Another".into()
            }
        );
        assert_eq!(menu.len(), 1);
    }

    #[test]
    fn indexed_actions_are_one_based_and_carry_data() {
        let id = Id::new();
        let mut menu = Menu::new("Test");
        menu.add_action_indexed(0, "First", |_| Ok(())).unwrap();
        menu.add_data_action("x", "Extra", id, |_| Ok(())).unwrap();
        assert!(menu.has_action("1"));
        assert_eq!(menu.get_data("X"), Some(id));
        assert_eq!(menu.get_data("1"), None);
        assert_eq!(menu.get_data("zz"), None);
    }

    #[test]
    fn keys_are_highlighted_in_text() {
        assert_eq!(highlight_key("North: On", "n"), "[N]orth: On");
        assert_eq!(highlight_key("Edit title", "t"), "Edi[t] title");
        assert_eq!(highlight_key("Northeast: Off", "ne"), "[NE]Northeast: Off");
        assert_eq!(highlight_key("Crossroads", "1"), "[1]Crossroads");
    }

    #[test]
    fn pagination_splits_by_half_height() {
        let pages = paginate(&lines(25), 80, 10);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].matches("\r\n").count(), 10);
        assert_eq!(pages[2].matches("\r\n").count(), 5);
        assert_eq!(paginate(&lines(10), 80, 10).len(), 1);
        assert_eq!(paginate(&[], 80, 10), vec![String::new()]);
    }

    #[test]
    fn pagination_counts_wrapped_rows() {
        let long = "x".repeat(25);
        let input = vec![long.clone(), long.clone(), long];
        // Each line wraps onto three 10-column rows.
        let pages = paginate(&input, 10, 6);
        assert_eq!(pages.len(), 2);
    }

    fn build_items<'a>(count: usize) -> impl FnMut(&mut Menu<'a>) -> Result<(), MenuError> + Send {
        move |menu| {
            for i in 0..count {
                menu.add_action_indexed(i, &format!("Item {}", i + 1), |_| Ok(()))?;
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn paging_is_clamped() {
        // 24 rows high => 12 options per page; 30 options => 3 pages.
        let mut term = ScriptedTerminal::new(&[">>", ">", ">", "<<", "<", ""]);
        let choice = exec_menu("Rooms", &mut term, build_items(30)).await.unwrap();
        assert_eq!(choice, None);
        assert_eq!(
            term.prompts,
            vec![
                "Page 1 of 3 (<, >, <<, >>)\r\n> ",
                "Page 3 of 3 (<, >, <<, >>)\r\n> ",
                "Page 3 of 3 (<, >, <<, >>)\r\n> ",
                "Page 3 of 3 (<, >, <<, >>)\r\n> ",
                "Page 1 of 3 (<, >, <<, >>)\r\n> ",
                "Page 1 of 3 (<, >, <<, >>)\r\n> ",
            ]
        );
    }

    #[tokio::test]
    async fn filter_persists_until_cleared() {
        let mut term = ScriptedTerminal::new(&["/item 1", "?", "/", ""]);
        exec_menu("Rooms", &mut term, build_items(12)).await.unwrap();
        let out = term.output();
        assert_eq!(out.matches("-=-=- Rooms -=-=- (/item 1)").count(), 2);
        assert_eq!(out.matches("-=-=- Rooms -=-=-\r\n").count(), 2);
        // "Item 1", "Item 10", "Item 11", "Item 12" match the filter; "Item 2" only shows
        // on the two unfiltered pages.
        assert_eq!(out.matches("  Item [1]\r\n").count(), 4);
        assert_eq!(out.matches("  Item [12]\r\n").count(), 4);
        assert_eq!(out.matches("  Item [2]\r\n").count(), 2);
        assert_eq!(term.prompts.len(), 4);
        assert!(term.prompts.iter().all(|p| p == "> "));
    }

    #[tokio::test]
    async fn filter_without_matches_says_so() {
        let mut term = ScriptedTerminal::new(&["/zzz", ""]);
        exec_menu("Rooms", &mut term, build_items(3)).await.unwrap();
        assert!(term.output().contains("No items match your search"));
    }

    #[tokio::test]
    async fn handlers_run_and_exit_returns_choice() {
        let toggles = AtomicUsize::new(0);
        let exited = AtomicUsize::new(0);
        let id = Id::new();
        let mut term = ScriptedTerminal::new(&["T", "t", "bogus", "help", "Q"]);
        let choice = exec_menu("Edit", &mut term, |menu| {
            menu.add_action("t", "Toggle", |_| {
                toggles.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })?;
            menu.add_data_action("q", "Quit", id, |control| {
                control.exit();
                Ok(())
            })?;
            menu.on_exit(|| {
                exited.fetch_add(1, Ordering::SeqCst);
            });
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(
            choice,
            Some(MenuChoice {
                key: "q".into(),
                data: Some(id)
            })
        );
        assert_eq!(toggles.load(Ordering::SeqCst), 2);
        assert_eq!(exited.load(Ordering::SeqCst), 1);
        assert_eq!(term.output().matches("Invalid selection").count(), 1);
    }

    #[tokio::test]
    async fn empty_input_runs_exit_handler() {
        let exited = AtomicUsize::new(0);
        let mut term = ScriptedTerminal::new(&[""]);
        exec_menu("Edit", &mut term, |menu| {
            menu.on_exit(|| {
                exited.fetch_add(1, Ordering::SeqCst);
            });
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(exited.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn duplicate_key_aborts_dialog() {
        let mut term = ScriptedTerminal::new(&["a"]);
        let result = exec_menu("Broken", &mut term, |menu| {
            menu.add_action("a", "One", |_| Ok(()))?;
            menu.add_action("a", "Two", |_| Ok(()))?;
            Ok(())
        })
        .await;
        assert!(matches!(
            result,
            Err(SessionError::Menu(MenuError::DuplicateKey { .. }))
        ));
        assert!(term.prompts.is_empty());
    }
}
