/*!
# Lucky Draw

A small web utility that picks a random winner from a spreadsheet of names.

## Overview

Upload an Excel file, and every non-empty value in the first column of its
first worksheet becomes an entry. One entry is drawn uniformly at random and
shown as the winner. The list is remembered, so "draw again" picks a new
winner from the same names without uploading again.

## Architecture

- **loader**: Spreadsheet Reader, turns an uploaded `.xlsx` / `.xls` payload into entries
- **saving**: the durable snapshot (`uploads/entries.json`) of the last uploaded list
- **session**: per-client session data (entries and flash messages) behind a cookie
- **store**: Entry Store, saves to and loads from the session with the snapshot as fallback
- **draw**: Draw Engine, uniform random choice
- **app**: routing and handlers (`GET /`, `POST /upload`, `POST /redraw`)
- **config**: runtime settings read from `LUCKY_DRAW_*` environment variables

## Persistence

There is exactly one snapshot for the whole server: the last successful
upload from any client replaces it. Sessions live in memory and expire after
seven days by default; after a restart, re-draws fall back to the snapshot.

## HTTP Endpoints

- `GET /` - Upload form; clears the entries held by the session
- `POST /upload` - Multipart field `file`; stores the entries and draws a winner
- `POST /redraw` - Draws again from the last known entries
- `GET /static/{file}` - Stylesheet
*/

pub mod app;
pub mod config;
pub mod draw;
pub mod entry;
pub mod loader;
pub mod saving;
pub mod session;
pub mod store;

pub use entry::Entry;
