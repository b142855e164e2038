use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Tabs, Wrap},
};
use std::io::stdout;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::warn;

use crate::companies::{company_links, CompanyView};
use crate::export::export_job;
use crate::models::{CompanyInfo, Job, SearchParams, WorkType};
use crate::saved::SavedJobs;
use crate::search::{SearchSession, SearchState};

const TICK: Duration = Duration::from_millis(100);
const MAX_VISIBLE_LOCATIONS: usize = 3;

const FORM_LABELS: [&str; 6] = ["Role", "Country", "Location", "Salary", "Work type", "Limit"];
const WORK_TYPE_FIELD: usize = 4;
const LIMIT_FIELD: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Form,
    Results,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResultsTab {
    Jobs,
    Companies,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobSort {
    Received,
    Title,
    Company,
    Location,
    Salary,
    Source,
}

impl JobSort {
    fn next(self) -> Self {
        match self {
            JobSort::Received => JobSort::Title,
            JobSort::Title => JobSort::Company,
            JobSort::Company => JobSort::Location,
            JobSort::Location => JobSort::Salary,
            JobSort::Salary => JobSort::Source,
            JobSort::Source => JobSort::Received,
        }
    }

    fn label(self) -> &'static str {
        match self {
            JobSort::Received => "received",
            JobSort::Title => "title",
            JobSort::Company => "company",
            JobSort::Location => "location",
            JobSort::Salary => "salary",
            JobSort::Source => "source",
        }
    }

    fn key(self, job: &Job) -> String {
        match self {
            JobSort::Received => String::new(),
            JobSort::Title => job.title.to_lowercase(),
            JobSort::Company => job.company.to_lowercase(),
            JobSort::Location => job.location.to_lowercase(),
            JobSort::Salary => job.salary_range.to_lowercase(),
            JobSort::Source => job.site.to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompanySort {
    Positions,
    Name,
}

impl CompanySort {
    fn next(self) -> Self {
        match self {
            CompanySort::Positions => CompanySort::Name,
            CompanySort::Name => CompanySort::Positions,
        }
    }

    fn label(self) -> &'static str {
        match self {
            CompanySort::Positions => "open positions",
            CompanySort::Name => "name",
        }
    }
}

fn sorted_jobs(jobs: &[Job], sort: JobSort, reversed: bool) -> Vec<&Job> {
    let mut view: Vec<&Job> = jobs.iter().collect();
    if sort != JobSort::Received {
        view.sort_by_cached_key(|job| sort.key(job));
    }
    if reversed {
        view.reverse();
    }
    view
}

fn sorted_companies(
    companies: &[CompanyInfo],
    sort: CompanySort,
    reversed: bool,
) -> Vec<&CompanyInfo> {
    let mut view: Vec<&CompanyInfo> = companies.iter().collect();
    if sort == CompanySort::Name {
        view.sort_by_cached_key(|c| c.name.to_lowercase());
    }
    if reversed {
        view.reverse();
    }
    view
}

fn location_summary(locations: &[String]) -> String {
    let shown = locations
        .iter()
        .take(MAX_VISIBLE_LOCATIONS)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    if locations.len() > MAX_VISIBLE_LOCATIONS {
        format!("{} +{}", shown, locations.len() - MAX_VISIBLE_LOCATIONS)
    } else {
        shown
    }
}

fn source_style(source: &str) -> Style {
    let lower = source.to_lowercase();
    if lower.contains("seek") {
        Style::default().fg(Color::Magenta)
    } else if lower.contains("linkedin") {
        Style::default().fg(Color::Blue)
    } else if lower.contains("indeed") {
        Style::default().fg(Color::LightBlue)
    } else {
        Style::default()
    }
}

// --- Search form ---

struct SearchForm {
    role: String,
    country: String,
    location: String,
    salary: String,
    work_type: WorkType,
    limit: String,
    focused: usize,
}

impl SearchForm {
    fn from_params(params: &SearchParams) -> Self {
        Self {
            role: params.role.clone(),
            country: params.country.clone(),
            location: params.location.clone(),
            salary: params.salary.clone(),
            work_type: params.work_type,
            limit: params.limit.to_string(),
            focused: 0,
        }
    }

    fn text_field(&mut self, idx: usize) -> Option<&mut String> {
        match idx {
            0 => Some(&mut self.role),
            1 => Some(&mut self.country),
            2 => Some(&mut self.location),
            3 => Some(&mut self.salary),
            LIMIT_FIELD => Some(&mut self.limit),
            _ => None,
        }
    }

    fn value(&self, idx: usize) -> String {
        match idx {
            0 => self.role.clone(),
            1 => self.country.clone(),
            2 => self.location.clone(),
            3 => self.salary.clone(),
            WORK_TYPE_FIELD => self.work_type.to_string(),
            _ => self.limit.clone(),
        }
    }

    fn next_field(&mut self) {
        self.focused = (self.focused + 1) % FORM_LABELS.len();
    }

    fn prev_field(&mut self) {
        self.focused = (self.focused + FORM_LABELS.len() - 1) % FORM_LABELS.len();
    }

    fn input(&mut self, c: char) {
        match self.focused {
            WORK_TYPE_FIELD => {
                if c == ' ' {
                    self.work_type = self.work_type.cycle();
                }
            }
            LIMIT_FIELD => {
                if c.is_ascii_digit() {
                    self.limit.push(c);
                }
            }
            idx => {
                if let Some(field) = self.text_field(idx) {
                    field.push(c);
                }
            }
        }
    }

    fn backspace(&mut self) {
        let idx = self.focused;
        if let Some(field) = self.text_field(idx) {
            field.pop();
        }
    }

    fn to_params(&self) -> Result<SearchParams, String> {
        let limit = self
            .limit
            .trim()
            .parse::<u32>()
            .map_err(|_| "Limit must be a positive number".to_string())?;
        Ok(SearchParams {
            role: self.role.trim().to_string(),
            country: self.country.trim().to_string(),
            location: self.location.trim().to_string(),
            salary: self.salary.trim().to_string(),
            work_type: self.work_type,
            limit,
        })
    }
}

// --- App state ---

struct AppState {
    session: SearchSession,
    runtime: Handle,
    saved: SavedJobs,
    export_dir: PathBuf,
    form: SearchForm,
    focus: Focus,
    tab: ResultsTab,
    snapshot: SearchState,
    view: CompanyView,
    job_sort: JobSort,
    company_sort: CompanySort,
    reversed: bool,
    selected: usize,
    scroll_offset: u16,
    searched: bool,
    message: Option<String>,
}

impl AppState {
    fn refresh(&mut self) {
        let snapshot = self.session.snapshot();
        if !Arc::ptr_eq(&snapshot.jobs, &self.snapshot.jobs) {
            self.selected = 0;
            self.scroll_offset = 0;
        }
        self.snapshot = snapshot;
    }

    fn submit(&mut self) {
        match self.form.to_params() {
            Ok(params) => {
                let session = self.session.clone();
                self.runtime.spawn(async move { session.search(params).await });
                self.searched = true;
                self.message = None;
                self.focus = Focus::Results;
            }
            Err(msg) => self.message = Some(msg),
        }
    }

    fn row_count(&mut self) -> usize {
        match self.tab {
            ResultsTab::Jobs => self.snapshot.jobs.len(),
            ResultsTab::Companies => self.view.companies(&self.snapshot.jobs).len(),
        }
    }

    fn next(&mut self) {
        let count = self.row_count();
        if count > 0 && self.selected < count - 1 {
            self.selected += 1;
            self.scroll_offset = 0;
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.scroll_offset = 0;
        }
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }

    fn switch_tab(&mut self) {
        self.tab = match self.tab {
            ResultsTab::Jobs => ResultsTab::Companies,
            ResultsTab::Companies => ResultsTab::Jobs,
        };
        self.selected = 0;
        self.scroll_offset = 0;
    }

    fn cycle_sort(&mut self) {
        match self.tab {
            ResultsTab::Jobs => self.job_sort = self.job_sort.next(),
            ResultsTab::Companies => self.company_sort = self.company_sort.next(),
        }
        self.selected = 0;
    }

    fn current_job(&self) -> Option<Job> {
        if self.tab != ResultsTab::Jobs {
            return None;
        }
        sorted_jobs(&self.snapshot.jobs, self.job_sort, self.reversed)
            .get(self.selected)
            .map(|job| (*job).clone())
    }

    /// Export and mark the selected job, or unmark it if already saved.
    fn toggle_saved(&mut self) {
        let Some(job) = self.current_job() else { return };
        if self.saved.is_job_saved(&job.id) {
            self.saved.unsave_job(&job.id);
            self.message = Some(format!("Unsaved '{}'", job.title));
            return;
        }
        match export_job(&job, &self.export_dir) {
            Ok(file_name) => {
                self.saved.save_job(&job.id, &file_name);
                self.message = Some(format!(
                    "Saved as {}",
                    self.export_dir.join(&file_name).display()
                ));
            }
            Err(e) => {
                warn!("Export failed: {:#}", e);
                self.message = Some(format!("Export failed: {:#}", e));
            }
        }
    }
}

pub fn run_dashboard(
    session: SearchSession,
    runtime: Handle,
    saved: SavedJobs,
    export_dir: PathBuf,
    initial: SearchParams,
) -> Result<()> {
    let mut state = AppState {
        snapshot: session.snapshot(),
        session,
        runtime,
        saved,
        export_dir,
        form: SearchForm::from_params(&initial),
        focus: Focus::Form,
        tab: ResultsTab::Jobs,
        view: CompanyView::new(),
        job_sort: JobSort::Received,
        company_sort: CompanySort::Positions,
        reversed: false,
        selected: 0,
        scroll_offset: 0,
        searched: false,
        message: None,
    };

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
) -> Result<()> {
    let mut table_state = TableState::default();

    loop {
        state.refresh();
        table_state.select(Some(state.selected));
        terminal.draw(|frame| draw(frame, state, &mut table_state))?;

        if !event::poll(TICK)? {
            continue;
        }
        let Event::Key(key) = event::read()? else { continue };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            break;
        }

        match state.focus {
            Focus::Form => match key.code {
                KeyCode::Enter => state.submit(),
                KeyCode::Tab | KeyCode::Down => state.form.next_field(),
                KeyCode::BackTab | KeyCode::Up => state.form.prev_field(),
                KeyCode::Left | KeyCode::Right if state.form.focused == WORK_TYPE_FIELD => {
                    state.form.input(' ')
                }
                KeyCode::Backspace => state.form.backspace(),
                KeyCode::Esc => state.focus = Focus::Results,
                KeyCode::Char(c) => state.form.input(c),
                _ => {}
            },
            Focus::Results => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Char('/') | KeyCode::Char('f') => state.focus = Focus::Form,
                KeyCode::Tab => state.switch_tab(),
                KeyCode::Down | KeyCode::Char('j') => state.next(),
                KeyCode::Up | KeyCode::Char('k') => state.prev(),
                KeyCode::Char('J') | KeyCode::PageDown => state.scroll_down(),
                KeyCode::Char('K') | KeyCode::PageUp => state.scroll_up(),
                KeyCode::Char('o') => state.cycle_sort(),
                KeyCode::Char('O') => state.reversed = !state.reversed,
                KeyCode::Char('s') => state.toggle_saved(),
                KeyCode::Char('r') => state.submit(),
                KeyCode::Char('x') => state.session.cancel(),
                _ => {}
            },
        }
    }
    Ok(())
}

fn draw(frame: &mut Frame, state: &mut AppState, table_state: &mut TableState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.area());

    frame.render_widget(form_widget(&state.form, state.focus == Focus::Form), rows[0]);
    frame.render_widget(banner(state), rows[1]);

    let tab_index = match state.tab {
        ResultsTab::Jobs => 0,
        ResultsTab::Companies => 1,
    };
    let sort_label = match state.tab {
        ResultsTab::Jobs => state.job_sort.label(),
        ResultsTab::Companies => state.company_sort.label(),
    };
    let tabs = Tabs::new(vec![
        format!("Jobs ({})", state.snapshot.jobs.len()),
        format!("Companies ({})", state.view.companies(&state.snapshot.jobs).len()),
        format!(
            "sort: {}{}",
            sort_label,
            if state.reversed { " (reversed)" } else { "" }
        ),
    ])
    .select(tab_index)
    .highlight_style(Style::default().add_modifier(Modifier::BOLD).fg(Color::Yellow));
    frame.render_widget(tabs, rows[2]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(rows[3]);

    let jobs = Arc::clone(&state.snapshot.jobs);
    let (table, detail) = match state.tab {
        ResultsTab::Jobs => {
            let view = sorted_jobs(&jobs, state.job_sort, state.reversed);
            let detail = view
                .get(state.selected)
                .map(|job| job_detail(job, &state.saved))
                .unwrap_or_else(|| Text::raw("No job selected"));
            (jobs_table(&view, &state.saved), detail)
        }
        ResultsTab::Companies => {
            let companies = state.view.companies(&jobs);
            let view = sorted_companies(companies, state.company_sort, state.reversed);
            let detail = view
                .get(state.selected)
                .map(|company| company_detail(company))
                .unwrap_or_else(|| Text::raw("No company selected"));
            (companies_table(&view), detail)
        }
    };

    frame.render_stateful_widget(table, body[0], table_state);

    let detail_widget = Paragraph::new(detail)
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));
    frame.render_widget(detail_widget, body[1]);

    let help = match state.focus {
        Focus::Form => " tab:next field  space/←→:work type  enter:search  esc:results  ctrl-c:quit",
        Focus::Results => {
            " j/k:navigate  J/K:scroll  tab:jobs/companies  o/O:sort  s:save/unsave  r:search  x:cancel  /:edit  q:quit"
        }
    };
    frame.render_widget(
        Paragraph::new(help).style(Style::default().fg(Color::DarkGray)),
        rows[4],
    );
}

fn form_widget(form: &SearchForm, focused: bool) -> Paragraph<'static> {
    let mut spans: Vec<Span> = Vec::new();
    for (idx, label) in FORM_LABELS.iter().enumerate() {
        let active = focused && form.focused == idx;
        spans.push(Span::styled(
            format!("{}: ", label),
            Style::default().fg(Color::DarkGray),
        ));
        let value_style = if active {
            Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        let mut value = form.value(idx);
        if active && idx != WORK_TYPE_FIELD {
            value.push('_');
        }
        spans.push(Span::styled(format!("[{}]", value), value_style));
        spans.push(Span::raw("  "));
    }
    Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title(" Search "))
}

fn banner(state: &AppState) -> Paragraph<'static> {
    if state.snapshot.loading {
        return Paragraph::new("Searching...").style(Style::default().fg(Color::Yellow));
    }
    if let Some(error) = &state.snapshot.error {
        return Paragraph::new(format!("Error: {}", error))
            .style(Style::default().fg(Color::White).bg(Color::Red));
    }
    if let Some(message) = &state.message {
        return Paragraph::new(message.clone()).style(Style::default().fg(Color::Cyan));
    }
    if state.searched && state.snapshot.jobs.is_empty() {
        return Paragraph::new("No jobs found. Try different search criteria.")
            .style(Style::default().fg(Color::DarkGray));
    }
    Paragraph::new("")
}

fn jobs_table(jobs: &[&Job], saved: &SavedJobs) -> Table<'static> {
    let rows: Vec<Row> = jobs
        .iter()
        .map(|job| {
            let salary = if job.salary_range.is_empty() {
                "N/A".to_string()
            } else {
                job.salary_range.clone()
            };
            let saved_mark = if saved.is_job_saved(&job.id) { "saved" } else { "" };
            Row::new(vec![
                Cell::from(job.title.clone()),
                Cell::from(job.company.clone()),
                Cell::from(job.location.clone()),
                Cell::from(salary),
                Cell::from(Span::styled(job.site.clone(), source_style(&job.site))),
                Cell::from(Span::styled(saved_mark, Style::default().fg(Color::Green))),
            ])
        })
        .collect();

    Table::new(
        rows,
        [
            Constraint::Percentage(30),
            Constraint::Percentage(20),
            Constraint::Percentage(17),
            Constraint::Percentage(13),
            Constraint::Percentage(10),
            Constraint::Percentage(10),
        ],
    )
    .header(
        Row::new(vec!["Title", "Company", "Location", "Salary", "Source", "Save"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().borders(Borders::ALL).title(" Jobs "))
    .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("> ")
}

fn companies_table(companies: &[&CompanyInfo]) -> Table<'static> {
    let rows: Vec<Row> = companies
        .iter()
        .map(|company| {
            let sources: Vec<Span> = company
                .sources
                .iter()
                .flat_map(|s| [Span::styled(s.clone(), source_style(s)), Span::raw(" ")])
                .collect();
            Row::new(vec![
                Cell::from(company.name.clone()),
                Cell::from(company.job_count.to_string()),
                Cell::from(location_summary(&company.locations)),
                Cell::from(Line::from(sources)),
            ])
        })
        .collect();

    Table::new(
        rows,
        [
            Constraint::Percentage(35),
            Constraint::Percentage(10),
            Constraint::Percentage(35),
            Constraint::Percentage(20),
        ],
    )
    .header(
        Row::new(vec!["Company", "Open", "Locations", "Sources"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().borders(Borders::ALL).title(" Companies "))
    .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("> ")
}

fn job_detail(job: &Job, saved: &SavedJobs) -> Text<'static> {
    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(Span::styled(
        job.title.clone(),
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(format!("at {}", job.company)));
    if !job.location.is_empty() {
        lines.push(Line::from(format!("Location: {}", job.location)));
    }
    if !job.salary_range.is_empty() {
        lines.push(Line::from(format!("Salary: {}", job.salary_range)));
    }
    lines.push(Line::from(vec![
        Span::raw("Source: "),
        Span::styled(job.site.clone(), source_style(&job.site)),
    ]));
    lines.push(Line::from(format!("URL: {}", job.job_url)));
    if !job.company_url.is_empty() {
        lines.push(Line::from(format!("Company URL: {}", job.company_url)));
    }

    let links = company_links(&job.company);
    lines.push(Line::from(format!("Glassdoor: {}", links.glassdoor)));
    lines.push(Line::from(format!("LinkedIn: {}", links.linkedin)));

    if let Some(info) = saved.saved_job_info(&job.id) {
        lines.push(Line::from(Span::styled(
            format!("Saved as: {}", info.file_name),
            Style::default().fg(Color::Green),
        )));
    }

    lines.push(Line::from(""));
    if job.description.is_empty() {
        lines.push(Line::from(Span::styled(
            "No description available",
            Style::default().fg(Color::DarkGray),
        )));
    } else {
        lines.push(Line::from(Span::styled(
            "Description",
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for line in textwrap::fill(&job.description, 70).lines() {
            lines.push(Line::from(line.to_string()));
        }
    }

    Text::from(lines)
}

fn company_detail(company: &CompanyInfo) -> Text<'static> {
    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(Span::styled(
        company.name.clone(),
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(format!("Open positions: {}", company.job_count)));
    if !company.locations.is_empty() {
        lines.push(Line::from(format!("Locations: {}", company.locations.join(", "))));
    }
    if !company.sources.is_empty() {
        lines.push(Line::from(format!("Sources: {}", company.sources.join(", "))));
    }

    let links = company_links(&company.name);
    lines.push(Line::from(format!("Glassdoor: {}", links.glassdoor)));
    lines.push(Line::from(format!("LinkedIn: {}", links.linkedin)));

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Open Positions",
        Style::default().add_modifier(Modifier::BOLD),
    )));
    for job in &company.jobs {
        lines.push(Line::from(format!("  {}", job.title)));
        lines.push(Line::from(Span::styled(
            format!("    {}", job.job_url),
            Style::default().fg(Color::DarkGray),
        )));
    }

    Text::from(lines)
}
